use std::collections::BTreeMap;

/// Boards used when no table is configured.
const DEFAULT_BOARDS: &[(&str, &str)] = &[
    ("ANA", "1"),
    ("FERNANDA", "2"),
    ("EVERSON", "3"),
    ("MARCELA", "4"),
];

/// Immutable owner → board lookup. Owner keys are stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardDirectory {
    boards: BTreeMap<String, String>,
}

impl BoardDirectory {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let boards = entries
            .into_iter()
            .map(|(owner, board)| (owner.as_ref().trim().to_uppercase(), board.into()))
            .filter(|(owner, _)| !owner.is_empty())
            .collect();
        BoardDirectory { boards }
    }

    /// Board id for an upper-cased owner token, `None` when the owner is unknown.
    pub fn lookup(&self, owner: &str) -> Option<&str> {
        self.boards.get(owner).map(String::as_str)
    }

    pub fn contains(&self, owner: &str) -> bool {
        self.boards.contains_key(owner)
    }

    pub fn len(&self) -> usize {
        self.boards.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.boards.iter().map(|(o, b)| (o.as_str(), b.as_str()))
    }
}

impl Default for BoardDirectory {
    fn default() -> Self {
        BoardDirectory::new(DEFAULT_BOARDS.iter().copied())
    }
}
