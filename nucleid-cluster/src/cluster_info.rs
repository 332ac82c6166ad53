use std::fmt::Write as _;

use nucleid_io::format_fixed4;

/// Membership class of an assigned sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// within the threshold of the center
    Member,
    /// within the error-relaxed threshold
    Extended,
    /// below even the relaxed threshold; only emitted when every sequence is assigned
    Outside,
}

/// One assigned sequence in the final output.
#[derive(Debug, Clone)]
pub struct MemberRecord {
    pub header: String,
    pub score_with_center: f64,
    /// score with the nearest other center; only filled during evaluation
    pub score_with_neighbor: f64,
    pub membership: Membership,
}

/// The output-side record of one cluster: its members and which of them is the center.
///
/// The member with the highest score against the synthetic mean is printed as the
/// center (`C`); the others carry their membership class (`M`, `E` or `O`).
#[derive(Debug, Clone)]
pub struct ClusterRecord {
    identifier: usize,
    members: Vec<MemberRecord>,
    rep_index: usize,
    rep_score: f64,
}

impl ClusterRecord {
    pub fn new(identifier: usize) -> ClusterRecord {
        ClusterRecord {
            identifier,
            members: Vec::new(),
            rep_index: 0,
            rep_score: 0.0,
        }
    }

    /// Adds one assigned sequence, tracking the best-scoring member as the center.
    pub fn add_member(&mut self, record: MemberRecord) {
        if record.score_with_center > self.rep_score {
            self.rep_score = record.score_with_center;
            self.rep_index = self.members.len();
        }
        self.members.push(record);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn identifier(&self) -> usize {
        self.identifier
    }

    pub fn set_identifier(&mut self, identifier: usize) {
        self.identifier = identifier;
    }

    pub fn members(&self) -> &[MemberRecord] {
        &self.members
    }

    /// The header of the center member.
    pub fn center(&self) -> Option<&str> {
        self.members.get(self.rep_index).map(|m| m.header.as_str())
    }

    /// Average distance of the members to the center, on the 1 − identity scale.
    pub fn intra(&self) -> f64 {
        if self.members.is_empty() {
            return f64::INFINITY;
        }
        let sum: f64 = self
            .members
            .iter()
            .map(|m| 1.0 - m.score_with_center)
            .sum();
        sum / self.members.len() as f64
    }

    /// Summed silhouette contribution of the members.
    pub fn silhouette_sum(&self) -> f64 {
        let mut total = 0.0;
        for m in &self.members {
            let dist_to_center = 1.0 - m.score_with_center;
            let dist_to_neighbor = 1.0 - m.score_with_neighbor;
            let larger = dist_to_center.max(dist_to_neighbor);
            if larger > 0.0 {
                total += (dist_to_neighbor - dist_to_center) / larger;
            }
        }
        total
    }

    /// Renders the cluster's output lines: `<id>\t<header>\t<score>\t<C|M|E|O>`.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (i, m) in self.members.iter().enumerate() {
            let mark = if i == self.rep_index {
                "C"
            } else {
                match m.membership {
                    Membership::Member => "M",
                    Membership::Extended => "E",
                    Membership::Outside => "O",
                }
            };
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{}",
                self.identifier,
                m.header,
                format_fixed4(m.score_with_center),
                mark
            );
        }
        out
    }
}
