//! Ancestor chain resolution
//!
//! `AncestorWalk` is a step-wise state machine: each ancestor moves through
//! `Pending -> AwaitingUserFile -> (next ancestor) | Resolved | Skipped`.
//! The caller answers each request with the ancestor's source or `None`,
//! so lookup can be interactive and cancelled at any step. Fields gathered
//! before a cancellation stay valid.

use crate::java::{extract_fields, ClassExtraction};
use scriptrefly_core::{merge_fields, FieldDescriptor};
use std::collections::HashSet;

/// Default limit on ancestors followed above the starting class
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default number of wrong files accepted for one ancestor before giving up
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Why an ancestor's fields were left out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The locator returned no source
    Declined,
    /// The supplied source has no recognizable class declaration
    ParseFailed,
    /// The ancestor was already visited further down the chain
    Cycle,
    /// The chain is longer than the configured limit
    DepthExceeded,
    /// The walk was aborted while waiting for a source
    Cancelled,
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Declined => write!(f, "no file was chosen"),
            Self::ParseFailed => write!(f, "the file could not be parsed"),
            Self::Cycle => write!(f, "the inheritance chain loops back on itself"),
            Self::DepthExceeded => write!(f, "the inheritance chain is too deep"),
            Self::Cancelled => write!(f, "the lookup was cancelled"),
        }
    }
}

/// Recoverable conditions reported alongside extracted fields
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionWarning {
    #[error("no fields were recognized")]
    ExtractionEmpty,

    #[error("fields of ancestor '{class_name}' were not loaded: {reason}")]
    AncestorUnresolved {
        class_name: String,
        reason: UnresolvedReason,
    },

    #[error("file supplied for '{expected}' declares '{found}' instead")]
    AncestorMismatch { expected: String, found: String },
}

/// Where the walk currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkState {
    /// A parent is named but has not been requested yet
    Pending { class_name: String },

    /// Waiting for the caller to supply the parent's source
    AwaitingUserFile { class_name: String },

    /// The chain ended with a class that has no parent
    Resolved,

    /// The walk stopped early at `class_name`
    Skipped { class_name: String, reason: UnresolvedReason },
}

/// Step-wise ancestor resolution
#[derive(Debug, Clone)]
pub struct AncestorWalk {
    class_name: Option<String>,
    fields: Vec<FieldDescriptor>,
    ancestors: Vec<String>,
    visited: HashSet<String>,
    warnings: Vec<ExtractionWarning>,
    state: WalkState,
    max_depth: usize,
}

impl AncestorWalk {
    /// Start a walk from the most-derived class
    pub fn start(source: &str) -> Self {
        Self::with_max_depth(source, DEFAULT_MAX_DEPTH)
    }

    /// Start a walk that follows at most `max_depth` ancestors
    pub fn with_max_depth(source: &str, max_depth: usize) -> Self {
        let extraction = extract_fields(source);

        let mut walk = Self {
            class_name: extraction.class_name.clone(),
            fields: Vec::new(),
            ancestors: Vec::new(),
            visited: HashSet::new(),
            warnings: Vec::new(),
            state: WalkState::Resolved,
            max_depth,
        };
        walk.absorb(extraction);
        walk
    }

    /// Current state
    pub fn state(&self) -> &WalkState {
        &self.state
    }

    /// Fields gathered so far (always a valid partial result)
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// True once no further source will be requested
    pub fn is_finished(&self) -> bool {
        matches!(self.state, WalkState::Resolved | WalkState::Skipped { .. })
    }

    /// Name of the ancestor whose source is needed next, if any.
    ///
    /// Moves a pending ancestor to `AwaitingUserFile`, or to `Skipped` when
    /// the depth limit is reached.
    pub fn next_request(&mut self) -> Option<&str> {
        if let WalkState::Pending { class_name } = &self.state {
            let class_name = class_name.clone();
            if self.ancestors.len() >= self.max_depth {
                self.skip(class_name, UnresolvedReason::DepthExceeded);
                return None;
            }
            self.state = WalkState::AwaitingUserFile { class_name };
        }

        match &self.state {
            WalkState::AwaitingUserFile { class_name } => Some(class_name.as_str()),
            _ => None,
        }
    }

    /// Answer the outstanding request.
    ///
    /// `None` skips the ancestor. A source declaring a different class is
    /// recorded as a mismatch and the request stays open.
    pub fn supply(&mut self, source: Option<&str>) {
        let WalkState::AwaitingUserFile { class_name } = &self.state else {
            tracing::warn!(state = ?self.state, "ancestor source supplied with no open request");
            return;
        };
        let expected = class_name.clone();

        let Some(source) = source else {
            self.skip(expected, UnresolvedReason::Declined);
            return;
        };

        let extraction = extract_fields(source);
        match extraction.class_name.as_deref() {
            None => self.skip(expected, UnresolvedReason::ParseFailed),
            Some(found) if found != expected => {
                tracing::warn!(expected = %expected, found, "supplied file declares a different class");
                self.warnings.push(ExtractionWarning::AncestorMismatch {
                    expected,
                    found: found.to_string(),
                });
            }
            Some(_) => {
                self.ancestors.push(expected);
                self.absorb(extraction);
            }
        }
    }

    /// Give up on the outstanding request, keeping what was gathered
    pub fn abort(&mut self) {
        let class_name = match &self.state {
            WalkState::Pending { class_name } | WalkState::AwaitingUserFile { class_name } => class_name.clone(),
            _ => return,
        };
        self.skip(class_name, UnresolvedReason::Cancelled);
    }

    /// Finish the walk (aborting any open request)
    pub fn finish(mut self) -> Resolution {
        self.abort();

        if self.fields.is_empty() {
            self.warnings.push(ExtractionWarning::ExtractionEmpty);
        }

        Resolution {
            class_name: self.class_name,
            fields: self.fields,
            ancestors: self.ancestors,
            warnings: self.warnings,
        }
    }

    fn absorb(&mut self, extraction: ClassExtraction) {
        if let Some(name) = &extraction.class_name {
            self.visited.insert(name.clone());
        }

        // More-derived fields were merged first, so they win on name clashes
        merge_fields(&mut self.fields, extraction.fields);

        self.state = match extraction.parent_name {
            Some(parent) if self.visited.contains(&parent) => {
                self.skip(parent, UnresolvedReason::Cycle);
                return;
            }
            Some(parent) => WalkState::Pending { class_name: parent },
            None => WalkState::Resolved,
        };
    }

    fn skip(&mut self, class_name: String, reason: UnresolvedReason) {
        tracing::warn!(class_name = %class_name, %reason, "ancestor skipped");
        self.warnings.push(ExtractionWarning::AncestorUnresolved {
            class_name: class_name.clone(),
            reason,
        });
        self.state = WalkState::Skipped { class_name, reason };
    }
}

/// Outcome of a full resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Most-derived class name
    pub class_name: Option<String>,

    /// Merged fields, most-derived first
    pub fields: Vec<FieldDescriptor>,

    /// Ancestors whose fields were merged, nearest first
    pub ancestors: Vec<String>,

    /// Recoverable conditions to surface to the user
    pub warnings: Vec<ExtractionWarning>,
}

impl Resolution {
    /// True when every named ancestor was loaded
    pub fn is_complete(&self) -> bool {
        !self
            .warnings
            .iter()
            .any(|w| matches!(w, ExtractionWarning::AncestorUnresolved { .. }))
    }
}

/// Supplies the source of a named ancestor class
pub trait AncestorLocator {
    /// Return the source of `class_name`, or `None` to skip it
    fn locate(&mut self, class_name: &str) -> Option<String>;
}

impl<F> AncestorLocator for F
where
    F: FnMut(&str) -> Option<String>,
{
    fn locate(&mut self, class_name: &str) -> Option<String> {
        self(class_name)
    }
}

/// Limits applied by [`resolve_with_options`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub max_depth: usize,
    pub max_attempts: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Extract a class's fields merged with those of its ancestors
pub fn resolve_with_ancestors(source: &str, locator: impl AncestorLocator) -> Resolution {
    resolve_with_options(source, locator, ResolveOptions::default())
}

/// [`resolve_with_ancestors`] with explicit limits
pub fn resolve_with_options(source: &str, mut locator: impl AncestorLocator, options: ResolveOptions) -> Resolution {
    let mut walk = AncestorWalk::with_max_depth(source, options.max_depth);
    let mut attempts = 0;
    let mut current: Option<String> = None;

    while let Some(class_name) = walk.next_request().map(str::to_owned) {
        if current.as_deref() == Some(class_name.as_str()) {
            attempts += 1;
        } else {
            current = Some(class_name.clone());
            attempts = 1;
        }

        if attempts > options.max_attempts {
            walk.abort();
            break;
        }

        let supplied = locator.locate(&class_name);
        walk.supply(supplied.as_deref());
    }

    walk.finish()
}
