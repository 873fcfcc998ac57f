//! Static scope used by the type checker.
//!
//! A scope is a stack of persistent frames (innermost last). Function
//! literals push a *boundary* frame holding their parameters; blocks push a
//! plain frame. Because frames are `im` maps, cloning a scope is cheap and
//! yields an immutable snapshot, which is how function bodies are typed.

use crate::builtins;
use crate::types::Type;

#[derive(Debug, Clone, Default)]
struct Frame {
    bindings: im::HashMap<String, Type>,
    boundary: bool,
}

/// The binding currently being defined, visible to its own right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub struct Defining {
    pub name: String,
    /// Declared function type, if the binding declares one.
    pub ty: Option<Type>,
    /// Frame depth at which the defining literal opens its own frame.
    pub frame: usize,
}

/// Where a name was found.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Bound in the frame at this index.
    Local { ty: Type, frame: usize },
    /// The binding currently being defined.
    Defining(Defining),
    Builtin(Type),
}

impl Resolution {
    /// Frame index the name lives in. Builtins live below every frame.
    pub fn frame(&self) -> Option<usize> {
        match self {
            Resolution::Local { frame, .. } => Some(*frame),
            Resolution::Defining(defining) => Some(defining.frame),
            Resolution::Builtin(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<Frame>,
    defining: Option<Defining>,
}

impl Default for Scope {
    fn default() -> Self {
        Scope::new()
    }
}

impl Scope {
    /// A root scope with a single top-level frame.
    pub fn new() -> Self {
        Scope {
            frames: vec![Frame::default()],
            defining: None,
        }
    }

    /// Number of frames; the index the next pushed frame will get.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_block(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Open a function frame. Returns its index.
    pub fn push_function(&mut self, params: &[(String, Type)]) -> usize {
        let mut frame = Frame {
            bindings: im::HashMap::new(),
            boundary: true,
        };
        for (name, ty) in params {
            frame.bindings.insert(name.clone(), ty.clone());
        }
        self.frames.push(frame);
        self.frames.len() - 1
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Index of the innermost function frame, if any.
    pub fn function_frame(&self) -> Option<usize> {
        self.frames.iter().rposition(|frame| frame.boundary)
    }

    pub fn bind(&mut self, name: impl Into<String>, ty: Type) {
        if let Some(frame) = self.frames.last_mut() {
            frame.bindings.insert(name.into(), ty);
        }
    }

    pub fn set_defining(&mut self, name: impl Into<String>, ty: Option<Type>) {
        self.defining = Some(Defining {
            name: name.into(),
            ty,
            frame: self.frames.len(),
        });
    }

    pub fn defining(&self) -> Option<&Defining> {
        self.defining.as_ref()
    }

    pub fn clear_defining(&mut self) -> Option<Defining> {
        self.defining.take()
    }

    /// Resolve `name`. Bindings opened inside the defining literal shadow the
    /// defining slot; the slot shadows everything outside it.
    pub fn lookup(&self, name: &str) -> Option<Resolution> {
        let defining = self
            .defining
            .as_ref()
            .filter(|defining| defining.name == name && self.frames.len() > defining.frame);
        match (self.lookup_local(name), defining) {
            (Some((_, frame)), Some(defining)) if frame < defining.frame => {
                Some(Resolution::Defining(defining.clone()))
            }
            (Some((ty, frame)), _) => Some(Resolution::Local { ty, frame }),
            (None, Some(defining)) => Some(Resolution::Defining(defining.clone())),
            (None, None) => builtins::builtin_type(name).map(Resolution::Builtin),
        }
    }

    /// Bound in a frame, ignoring builtins and the defining slot.
    pub fn lookup_local(&self, name: &str) -> Option<(Type, usize)> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find_map(|(index, frame)| frame.bindings.get(name).map(|ty| (ty.clone(), index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_frames_shadow_and_pop() {
        let mut scope = Scope::new();
        scope.bind("iX", Type::Int);
        scope.push_block();
        scope.bind("iX", Type::Double);
        assert_eq!(
            scope.lookup("iX"),
            Some(Resolution::Local {
                ty: Type::Double,
                frame: 1
            })
        );
        scope.pop();
        assert_eq!(scope.lookup_local("iX"), Some((Type::Int, 0)));
    }

    #[test]
    fn snapshots_are_independent() {
        let mut scope = Scope::new();
        scope.bind("iX", Type::Int);
        let snapshot = scope.clone();
        scope.bind("iY", Type::Int);
        assert!(snapshot.lookup("iY").is_none());
        assert!(scope.lookup("iY").is_some());
    }

    #[test]
    fn defining_slot_is_visible_only_inside_the_literal() {
        let mut scope = Scope::new();
        let ty = Type::function(vec![Type::Int], Type::Int);
        scope.set_defining("fiFact", Some(ty.clone()));
        assert!(scope.lookup("fiFact").is_none());
        let frame = scope.push_function(&[("iN".to_string(), Type::Int)]);
        assert_eq!(scope.function_frame(), Some(frame));
        match scope.lookup("fiFact") {
            Some(Resolution::Defining(defining)) => assert_eq!(defining.ty, Some(ty)),
            other => panic!("unexpected {other:?}"),
        }
        scope.pop();
        scope.clear_defining();
        assert!(scope.lookup("fiFact").is_none());
    }

    #[test]
    fn parameters_shadow_the_defining_slot() {
        let mut scope = Scope::new();
        scope.set_defining("fiG", Some(Type::function(vec![Type::Int], Type::Int)));
        let param = Type::function(vec![Type::Int], Type::Int);
        let frame = scope.push_function(&[("fiG".to_string(), param.clone())]);
        assert_eq!(
            scope.lookup("fiG"),
            Some(Resolution::Local { ty: param, frame })
        );
        scope.push_block();
        scope.bind("iX", Type::Int);
        assert!(matches!(scope.lookup("iX"), Some(Resolution::Local { .. })));
    }

    #[test]
    fn builtins_resolve_last() {
        let mut scope = Scope::new();
        assert!(matches!(scope.lookup("fiLen"), Some(Resolution::Builtin(_))));
        scope.push_function(&[("fiLen".to_string(), Type::function(vec![], Type::Int))]);
        assert!(matches!(scope.lookup("fiLen"), Some(Resolution::Local { .. })));
    }
}
