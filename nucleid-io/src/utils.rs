use std::fs::File;
use std::io::{stderr, stdout, BufWriter, Error, Write};
use std::path::Path;

/// Creates a `Writer` object.
///
/// Attempts to open a file under a given name. However, if the name is `"stdout"` or `"stderr"`,
/// the returned `Writer` will be connected to either `stdout` or `stderr` stream, respectively.
/// Empty file name also results in writing to `stdout`.
///
/// # Arguments
/// * `out_fname` - file name, `"stdout"` or `"stderr"`
/// * `if_append` - existing file will be removed if false, otherwise the new content will be appended
///
/// # Examples
///
/// ```
/// use std::fs;
/// use nucleid_io::out_writer;
/// let mut to_stream = out_writer("", true).unwrap();
/// to_stream = out_writer("stdout", true).unwrap();
/// assert!(fs::metadata("stdout").is_err());
/// let mut to_file = out_writer("file.out", false).unwrap();
/// assert!(fs::metadata("file.out").is_ok());
/// # fs::remove_file("file.out").expect("Can't remove a test file: file.out");
/// ```
pub fn out_writer(out_fname: &str, if_append: bool) -> Result<Box<dyn Write>, Error> {
    match out_fname {
        "" | "stdout" => Ok(Box::new(stdout()) as Box<dyn Write>),
        "stderr" => Ok(Box::new(stderr()) as Box<dyn Write>),
        _ => {
            let path = Path::new(out_fname);
            let file = if if_append {
                File::options().append(true).create(true).open(path)?
            } else {
                File::create(path)?
            };
            Ok(Box::new(BufWriter::new(file)) as Box<dyn Write>)
        }
    }
}

/// Formats a score with four significant digits, trimming trailing zeros.
///
/// Identity scores live in `[0, 1]`; this mirrors the unpadded style of
/// stream-precision printing, so `1.0` becomes `"1"` and `0.85` stays `"0.85"`.
///
/// # Examples
/// ```
/// use nucleid_io::format_sig4;
/// assert_eq!(format_sig4(1.0), "1");
/// assert_eq!(format_sig4(0.85), "0.85");
/// assert_eq!(format_sig4(0.823456), "0.8235");
/// assert_eq!(format_sig4(0.082345), "0.08234");
/// assert_eq!(format_sig4(0.0), "0");
/// ```
pub fn format_sig4(x: f64) -> String {
    if x == 0.0 {
        return String::from("0");
    }
    let decimals = 3 - x.abs().log10().floor() as i32;
    let decimals = decimals.clamp(0, 17) as usize;
    let mut s = format!("{:.*}", decimals, x);
    if s.contains('.') {
        while s.ends_with('0') {
            s.pop();
        }
        if s.ends_with('.') {
            s.pop();
        }
    }
    s
}

/// Formats a score with exactly four decimal places, as used in cluster records.
///
/// # Examples
/// ```
/// use nucleid_io::format_fixed4;
/// assert_eq!(format_fixed4(1.0), "1.0000");
/// assert_eq!(format_fixed4(0.85), "0.8500");
/// ```
pub fn format_fixed4(x: f64) -> String {
    format!("{:.4}", x)
}
