//! Dashboard selection shared by restore, create and revision backup.

use serde_json::Value;
use std::collections::BTreeSet;

/// Name that selects every dashboard (or every host).
pub const ALL: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardFilter {
    All,
    /// Lower-cased uids or `<title>_<uid>` stems
    Only(BTreeSet<String>),
}

impl DashboardFilter {
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = names
            .into_iter()
            .map(|n| n.as_ref().trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();

        if names.is_empty() || names.contains(ALL) {
            DashboardFilter::All
        } else {
            DashboardFilter::Only(names)
        }
    }

    pub fn matches_uid(&self, uid: &str) -> bool {
        match self {
            DashboardFilter::All => true,
            DashboardFilter::Only(names) => names.contains(&uid.to_lowercase()),
        }
    }

    /// Candidate check on a stored file stem (`<title>_<uid>`): full stem or
    /// uid suffix. Uids may contain `_`, so a suffix hit still has to pass
    /// [`DashboardFilter::matches_stored`].
    pub fn matches_stem(&self, stem: &str) -> bool {
        match self {
            DashboardFilter::All => true,
            DashboardFilter::Only(names) => {
                let stem = stem.to_lowercase();
                names
                    .iter()
                    .any(|name| stem == *name || stem.ends_with(&format!("_{}", name)))
            }
        }
    }

    /// Final check on a loaded document: the full stem was requested, or the
    /// uid recorded in the document was.
    pub fn matches_stored(&self, stem: &str, document: &Value) -> bool {
        match self {
            DashboardFilter::All => true,
            DashboardFilter::Only(names) => {
                names.contains(&stem.to_lowercase())
                    || document
                        .pointer("/dashboard/uid")
                        .and_then(Value::as_str)
                        .is_some_and(|uid| self.matches_uid(uid))
            }
        }
    }
}

impl Default for DashboardFilter {
    fn default() -> Self {
        DashboardFilter::All
    }
}
