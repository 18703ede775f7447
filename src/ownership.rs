//! Move/borrow state machine, run alongside the type checker's second pass.
//!
//! Mirrors the type environment's own scope stack so a borrow started in a
//! block is forced to end when that block's scope pops, without needing a
//! separate lifetime solver.

use std::collections::HashMap;
use std::fmt;

use crate::source::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipState {
    Owned,
    Moved,
    Borrowed(u32),
    MutablyBorrowed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipError {
    UseAfterMove { name: String, location: SourceLocation },
    MultipleMutableBorrows { name: String, location: SourceLocation },
    BorrowWhileMutablyBorrowed { name: String, location: SourceLocation },
    MutBorrowWhileBorrowed { name: String, location: SourceLocation },
}

impl fmt::Display for OwnershipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnershipError::UseAfterMove { name, location } => {
                write!(f, "use of moved value `{}` at {}", name, location)
            }
            OwnershipError::MultipleMutableBorrows { name, location } => {
                write!(f, "`{}` is already mutably borrowed, at {}", name, location)
            }
            OwnershipError::BorrowWhileMutablyBorrowed { name, location } => {
                write!(f, "cannot borrow `{}` as shared because it is mutably borrowed, at {}", name, location)
            }
            OwnershipError::MutBorrowWhileBorrowed { name, location } => {
                write!(f, "cannot borrow `{}` as mutable because it is already borrowed, at {}", name, location)
            }
        }
    }
}

impl std::error::Error for OwnershipError {}

struct OwnershipScope {
    states: HashMap<String, OwnershipState>,
}

/// Tracks exactly one state per binding, scoped like `TypeEnv`: a child
/// scope's lookups fall through to the parent, and the whole child scope
/// is dropped (ending any borrows it started) in one step when it pops.
pub struct OwnershipTracker {
    scopes: Vec<OwnershipScope>,
}

impl OwnershipTracker {
    pub fn new() -> Self {
        OwnershipTracker {
            scopes: vec![OwnershipScope { states: HashMap::new() }],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(OwnershipScope { states: HashMap::new() });
    }

    /// Pop the current scope, restoring the borrow count of any binding in
    /// an outer scope that this scope had an active borrow against.
    pub fn pop_scope(&mut self) {
        let scope = self.scopes.pop().expect("popped the root scope");
        for (name, state) in scope.states {
            self.end_borrow_in_outer_scope(&name, state);
        }
    }

    fn end_borrow_in_outer_scope(&mut self, name: &str, ending_state: OwnershipState) {
        // Bindings declared in the popped scope simply vanish; bindings
        // declared in an outer scope but borrowed here need their borrow
        // released in the scope that owns them.
        if self.scope_declares(name) {
            return;
        }
        if let Some(outer_state) = self.lookup_mut(name) {
            match (ending_state, *outer_state) {
                (OwnershipState::Borrowed(_), OwnershipState::Borrowed(k)) if k > 0 => {
                    *outer_state = if k - 1 == 0 {
                        OwnershipState::Owned
                    } else {
                        OwnershipState::Borrowed(k - 1)
                    };
                }
                (OwnershipState::MutablyBorrowed, OwnershipState::MutablyBorrowed) => {
                    *outer_state = OwnershipState::Owned;
                }
                _ => {}
            }
        }
    }

    fn scope_declares(&self, name: &str) -> bool {
        self.scopes.last().is_some_and(|s| s.states.contains_key(name))
    }

    pub fn declare(&mut self, name: impl Into<String>) {
        self.scopes
            .last_mut()
            .expect("at least one scope")
            .states
            .insert(name.into(), OwnershipState::Owned);
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut OwnershipState> {
        self.scopes.iter_mut().rev().find_map(|s| s.states.get_mut(name))
    }

    pub fn state_of(&self, name: &str) -> Option<OwnershipState> {
        self.scopes.iter().rev().find_map(|s| s.states.get(name).copied())
    }

    /// A read of `x` whose value is not `Copy`: moves `x`, or reports
    /// `UseAfterMove` if it is already moved.
    pub fn record_move(&mut self, name: &str, location: SourceLocation) -> Option<OwnershipError> {
        match self.lookup_mut(name) {
            Some(state) => match *state {
                OwnershipState::Moved => Some(OwnershipError::UseAfterMove {
                    name: name.to_string(),
                    location,
                }),
                _ => {
                    *state = OwnershipState::Moved;
                    None
                }
            },
            None => None,
        }
    }

    /// A read of a `Copy` binding: no state transition, but still flags a
    /// stale read through a moved binding should that ever occur upstream.
    pub fn record_copy_read(&mut self, name: &str, location: SourceLocation) -> Option<OwnershipError> {
        match self.lookup_mut(name) {
            Some(OwnershipState::Moved) => Some(OwnershipError::UseAfterMove {
                name: name.to_string(),
                location,
            }),
            _ => None,
        }
    }

    pub fn record_shared_borrow(&mut self, name: &str, location: SourceLocation) -> Option<OwnershipError> {
        match self.lookup_mut(name) {
            Some(state) => match *state {
                OwnershipState::MutablyBorrowed => Some(OwnershipError::BorrowWhileMutablyBorrowed {
                    name: name.to_string(),
                    location,
                }),
                OwnershipState::Owned => {
                    *state = OwnershipState::Borrowed(1);
                    None
                }
                OwnershipState::Borrowed(k) => {
                    *state = OwnershipState::Borrowed(k + 1);
                    None
                }
                OwnershipState::Moved => Some(OwnershipError::UseAfterMove {
                    name: name.to_string(),
                    location,
                }),
            },
            None => None,
        }
    }

    pub fn record_mutable_borrow(&mut self, name: &str, location: SourceLocation) -> Option<OwnershipError> {
        match self.lookup_mut(name) {
            Some(state) => match *state {
                OwnershipState::MutablyBorrowed => Some(OwnershipError::MultipleMutableBorrows {
                    name: name.to_string(),
                    location,
                }),
                OwnershipState::Borrowed(k) if k > 0 => Some(OwnershipError::MutBorrowWhileBorrowed {
                    name: name.to_string(),
                    location,
                }),
                OwnershipState::Moved => Some(OwnershipError::UseAfterMove {
                    name: name.to_string(),
                    location,
                }),
                OwnershipState::Owned | OwnershipState::Borrowed(_) => {
                    *state = OwnershipState::MutablyBorrowed;
                    None
                }
            },
            None => None,
        }
    }
}

impl Default for OwnershipTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1)
    }

    #[test]
    fn move_then_use_is_rejected() {
        let mut t = OwnershipTracker::new();
        t.declare("s");
        assert!(t.record_move("s", loc()).is_none());
        assert!(matches!(t.record_move("s", loc()), Some(OwnershipError::UseAfterMove { .. })));
    }

    #[test]
    fn copy_binding_never_moves() {
        let mut t = OwnershipTracker::new();
        t.declare("n");
        assert!(t.record_copy_read("n", loc()).is_none());
        assert!(t.record_copy_read("n", loc()).is_none());
        assert_eq!(t.state_of("n"), Some(OwnershipState::Owned));
    }

    #[test]
    fn shared_borrows_stack_and_release_together() {
        let mut t = OwnershipTracker::new();
        t.declare("a");
        assert!(t.record_shared_borrow("a", loc()).is_none());
        assert!(t.record_shared_borrow("a", loc()).is_none());
        assert_eq!(t.state_of("a"), Some(OwnershipState::Borrowed(2)));
    }

    #[test]
    fn mutable_borrow_while_shared_is_rejected() {
        let mut t = OwnershipTracker::new();
        t.declare("a");
        t.record_shared_borrow("a", loc());
        assert!(matches!(
            t.record_mutable_borrow("a", loc()),
            Some(OwnershipError::MutBorrowWhileBorrowed { .. })
        ));
    }

    #[test]
    fn shared_borrow_while_mutable_is_rejected() {
        let mut t = OwnershipTracker::new();
        t.declare("a");
        t.record_mutable_borrow("a", loc());
        assert!(matches!(
            t.record_shared_borrow("a", loc()),
            Some(OwnershipError::BorrowWhileMutablyBorrowed { .. })
        ));
    }

    #[test]
    fn second_mutable_borrow_is_rejected() {
        let mut t = OwnershipTracker::new();
        t.declare("a");
        t.record_mutable_borrow("a", loc());
        assert!(matches!(
            t.record_mutable_borrow("a", loc()),
            Some(OwnershipError::MultipleMutableBorrows { .. })
        ));
    }

    #[test]
    fn borrow_ends_when_its_scope_pops() {
        let mut t = OwnershipTracker::new();
        t.declare("a");
        t.push_scope();
        t.record_mutable_borrow("a", loc());
        t.pop_scope();
        assert_eq!(t.state_of("a"), Some(OwnershipState::Owned));
        // now a fresh mutable borrow in the outer scope succeeds again
        assert!(t.record_mutable_borrow("a", loc()).is_none());
    }
}
