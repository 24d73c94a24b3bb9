pub mod todo;
pub mod user;

#[cfg(test)]
pub mod test_util;

/// The identity of whoever is making a request. Every operation which touches user-owned data
/// takes one of these explicitly.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Principal {
    pub user_id: i32,
}

/// A single field of a partial update. Keeps "leave it alone" apart from "clear it", which an
/// [Option] alone can't express.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Patch<T> {
    /// The field was not supplied and keeps its current value
    Unset,
    /// The field was supplied as null and should be emptied
    Clear,
    /// The field was supplied with a new value
    Set(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unset
    }
}

impl<T> Patch<T> {
    /// Resolves a field which can't be emptied. [Patch::Clear] leaves the field as it was;
    /// callers are expected to have rejected it during validation.
    pub fn resolve_required(self, current: T) -> T {
        match self {
            Patch::Set(value) => value,
            Patch::Unset | Patch::Clear => current,
        }
    }

    /// Resolves a nullable field
    pub fn resolve_nullable(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Unset => current,
            Patch::Clear => None,
            Patch::Set(value) => Some(value),
        }
    }
}
