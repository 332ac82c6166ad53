use nucleid_math::{MathError, Matrix};

#[test]
fn test_basic_algebra() {
    let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    let b = Matrix::from_rows(vec![vec![5.0, 6.0], vec![7.0, 8.0]]).unwrap();

    let sum = a.plus(&b).unwrap();
    assert_eq!(sum[(0, 0)], 6.0);
    assert_eq!(sum[(1, 1)], 12.0);

    let diff = b.minus(&a).unwrap();
    assert_eq!(diff[(0, 1)], 4.0);

    let product = a.times(&b).unwrap();
    assert_eq!(product[(0, 0)], 19.0);
    assert_eq!(product[(0, 1)], 22.0);
    assert_eq!(product[(1, 0)], 43.0);
    assert_eq!(product[(1, 1)], 50.0);
}

#[test]
fn test_transpose() {
    let a = Matrix::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
    let t = a.transpose();
    assert_eq!(t.rows(), 3);
    assert_eq!(t.cols(), 2);
    assert_eq!(t[(2, 1)], 6.0);
}

#[test]
fn test_inverse_of_identity_like() {
    let a = Matrix::from_rows(vec![
        vec![2.0, 0.0, 0.0],
        vec![0.0, 4.0, 0.0],
        vec![0.0, 0.0, 8.0],
    ])
    .unwrap();
    let inv = a.inverse().unwrap();
    assert!((inv[(0, 0)] - 0.5).abs() < 1e-12);
    assert!((inv[(1, 1)] - 0.25).abs() < 1e-12);
    assert!((inv[(2, 2)] - 0.125).abs() < 1e-12);
}

#[test]
fn test_inverse_times_original_is_identity() {
    let a = Matrix::from_rows(vec![
        vec![4.0, 7.0, 2.0],
        vec![3.0, 5.0, 1.0],
        vec![8.0, 1.0, 6.0],
    ])
    .unwrap();
    let identity = a.inverse().unwrap().times(&a).unwrap();
    for i in 0..3 {
        for j in 0..3 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((identity[(i, j)] - expected).abs() < 1e-9, "at ({}, {})", i, j);
        }
    }
}

#[test]
fn test_inverse_with_zero_pivot() {
    // Needs the zero-pivot row addition to succeed.
    let a = Matrix::from_rows(vec![vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
    let inv = a.inverse().unwrap();
    let identity = inv.times(&a).unwrap();
    assert!((identity[(0, 0)] - 1.0).abs() < 1e-12);
    assert!((identity[(0, 1)]).abs() < 1e-12);
}

#[test]
fn test_singular_matrix_is_reported() {
    let a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![2.0, 4.0]]).unwrap();
    assert!(matches!(a.inverse(), Err(MathError::Singular)));
}

#[test]
fn test_pseudo_inverse_tall() {
    // Least squares through the pseudo-inverse: fit y = 2x on three points.
    let a = Matrix::from_rows(vec![vec![1.0], vec![2.0], vec![3.0]]).unwrap();
    let y = Matrix::from_rows(vec![vec![2.0], vec![4.0], vec![6.0]]).unwrap();
    let w = a.pseudo_inverse().unwrap().times(&y).unwrap();
    assert!((w[(0, 0)] - 2.0).abs() < 1e-9);
}

#[test]
fn test_pseudo_inverse_wide() {
    let a = Matrix::from_rows(vec![vec![1.0, 0.0, 1.0]]).unwrap();
    let p = a.pseudo_inverse().unwrap();
    assert_eq!(p.rows(), 3);
    assert_eq!(p.cols(), 1);
    // A · A⁺ = 1 for a full-rank wide matrix.
    let product = a.times(&p).unwrap();
    assert!((product[(0, 0)] - 1.0).abs() < 1e-9);
}

#[test]
fn test_sub_matrices() {
    let a = Matrix::from_rows(vec![
        vec![1.0, 2.0, 3.0],
        vec![4.0, 5.0, 6.0],
        vec![7.0, 8.0, 9.0],
    ])
    .unwrap();
    let rows = a.sub_matrix(&[2, 0]).unwrap();
    assert_eq!(rows.row(0), &[7.0, 8.0, 9.0]);
    assert_eq!(rows.row(1), &[1.0, 2.0, 3.0]);

    let cols = a.sub_matrix_by_col(&[1]).unwrap();
    assert_eq!(cols.cols(), 1);
    assert_eq!(cols[(2, 0)], 8.0);

    assert!(matches!(
        a.sub_matrix(&[5]),
        Err(MathError::IndexOutOfRange { .. })
    ));
}

#[test]
fn test_ones_column_is_first() {
    let a = Matrix::from_rows(vec![vec![2.0, 3.0]]).unwrap();
    let with_bias = a.append_ones_column();
    assert_eq!(with_bias.row(0), &[1.0, 2.0, 3.0]);
}

#[test]
fn test_dimension_mismatch() {
    let a = Matrix::zeros(2, 3);
    let b = Matrix::zeros(2, 2);
    assert!(matches!(a.plus(&b), Err(MathError::DimensionMismatch { .. })));
    assert!(matches!(a.times(&a), Err(MathError::DimensionMismatch { .. })));
}
