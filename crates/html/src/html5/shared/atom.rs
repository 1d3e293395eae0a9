//! Atom table for canonicalized tag and attribute names.

use std::collections::HashMap;
use std::sync::Arc;

/// Opaque atom identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AtomId(pub u32);

/// Per-tokenizer atom table.
///
/// Invariant: ASCII letters are stored in canonical lowercase form. Non-ASCII
/// code points are preserved as-is.
///
/// Atom ids never leave the thread that interned them: tokens crossing the
/// worker boundary carry resolved names (see `CompactToken`).
#[derive(Debug, Default)]
pub struct AtomTable {
    atoms: Vec<Arc<str>>,
    map: HashMap<Arc<str>, AtomId>,
}

impl AtomTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> Result<AtomId, AtomError> {
        let idx: u32 = self
            .atoms
            .len()
            .try_into()
            .map_err(|_| AtomError::OutOfIds)?;
        Ok(AtomId(idx))
    }

    /// Intern a name, applying ASCII-lowercase folding.
    pub fn intern_ascii_folded(&mut self, name: &str) -> Result<AtomId, AtomError> {
        let folded;
        let key = if name.bytes().any(|b| b.is_ascii_uppercase()) {
            folded = name.to_ascii_lowercase();
            folded.as_str()
        } else {
            name
        };
        if let Some(id) = self.map.get(key) {
            return Ok(*id);
        }
        let id = self.next_id()?;
        let atom = Arc::<str>::from(key);
        self.atoms.push(Arc::clone(&atom));
        self.map.insert(atom, id);
        Ok(id)
    }

    pub fn resolve(&self, id: AtomId) -> Option<&str> {
        self.atoms.get(id.0 as usize).map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AtomError {
    #[error("atom table exhausted its id space")]
    OutOfIds,
}

#[cfg(test)]
mod tests {
    use super::AtomTable;

    #[test]
    fn interning_folds_ascii_case() {
        let mut atoms = AtomTable::new();
        let a = atoms.intern_ascii_folded("DiV").unwrap();
        let b = atoms.intern_ascii_folded("div").unwrap();
        assert_eq!(a, b);
        assert_eq!(atoms.resolve(a), Some("div"));
        assert_eq!(atoms.len(), 1);
    }

    #[test]
    fn non_ascii_names_are_preserved() {
        let mut atoms = AtomTable::new();
        let id = atoms.intern_ascii_folded("Ünïcode").unwrap();
        assert_eq!(atoms.resolve(id), Some("Ünïcode"));
    }
}
