//! Generic instantiation bookkeeping.
//!
//! Every `(template, argument)` pair the checker encounters is recorded here
//! exactly once, in first-encountered order. That order is the order in
//! which instances are emitted.

use std::collections::{HashMap, VecDeque};

use crate::{
    types::{well_known, FnSig, StructLayout, Type, MAX_INSTANCE_DEPTH},
    util::{
        intern::{Interner, Symbol},
        OrderedSet,
    },
};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("instances {first} and {second} both expand to {name}")]
    Conflict {
        name: String,
        first: String,
        second: String,
    },
    #[error("instance {name} nests deeper than {limit} levels")]
    TooDeep { name: String, limit: usize },
}

impl Error {
    /// The generated name of the offending instance.
    pub fn path(&self) -> &str {
        match self {
            Error::Conflict { name, .. } | Error::TooDeep { name, .. } => name,
        }
    }
}

#[derive(Debug, Default)]
pub struct Monomorphizer {
    instances: OrderedSet<Type>,
    names: HashMap<String, Type>,
    /// User template instances whose methods are yet to be checked.
    pending: VecDeque<Type>,
}

impl Monomorphizer {
    pub fn new() -> Monomorphizer {
        Monomorphizer::default()
    }

    /// Records the instance `ty`, which must be a `Type::Generic` with a
    /// concrete argument. Returns `true` the first time the key is seen.
    pub fn request(&mut self, ty: &Type, idents: &Interner<str>) -> Result<bool, Error> {
        let Type::Generic(template, _) = ty else {
            return Ok(false);
        };
        debug_assert!(!ty.has_param(), "instances must be concrete");
        if self.instances.contains(ty) {
            return Ok(false);
        }

        let name = ty.mangled(idents);
        if ty.depth() > MAX_INSTANCE_DEPTH {
            return Err(Error::TooDeep {
                name,
                limit: MAX_INSTANCE_DEPTH,
            });
        }
        if let Some(other) = self.names.get(&name) {
            return Err(Error::Conflict {
                name,
                first: other.show(idents),
                second: ty.show(idents),
            });
        }

        tracing::debug!(instance = %name, "scheduled instantiation");
        self.names.insert(name, ty.clone());
        self.instances.insert(ty.clone());
        if !well_known::is_builtin_template(*template) {
            self.pending.push_back(ty.clone());
        }
        Ok(true)
    }

    /// Pops the next user template instance whose methods need checking.
    pub fn next_pending(&mut self) -> Option<Type> {
        self.pending.pop_front()
    }

    pub fn instances(&self) -> impl Iterator<Item = &Type> {
        self.instances.iter()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

/// Replaces every occurrence of `param` in `ty` with `arg`.
pub fn substitute(ty: &Type, param: Symbol, arg: &Type) -> Type {
    match ty {
        Type::Param(name) if *name == param => arg.clone(),
        Type::Generic(template, inner) => {
            Type::Generic(*template, Box::new(substitute(inner, param, arg)))
        }
        other => other.clone(),
    }
}

/// Re-types a template layout for a concrete argument. Field order is kept.
pub fn instantiate_layout(layout: &StructLayout, param: Symbol, arg: &Type) -> StructLayout {
    StructLayout {
        fields: layout
            .fields
            .iter()
            .map(|(name, ty)| (*name, substitute(ty, param, arg)))
            .collect(),
    }
}

pub fn instantiate_sig(sig: &FnSig, param: Symbol, arg: &Type) -> FnSig {
    FnSig {
        params: sig
            .params
            .iter()
            .map(|ty| substitute(ty, param, arg))
            .collect(),
        ret: substitute(&sig.ret, param, arg),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::util::intern::Interner;

    fn generic(template: Symbol, arg: Type) -> Type {
        Type::Generic(template, Box::new(arg))
    }

    #[test]
    fn instances_are_deduplicated_in_first_use_order() {
        let i = &mut Interner::with_capacity(16);
        well_known::register(i);
        let pair = i.intern("Pair");

        let mono = &mut Monomorphizer::new();
        let array_int = generic(well_known::ARRAY, Type::Int);
        let pair_bool = generic(pair, Type::Bool);
        assert_eq!(mono.request(&pair_bool, i), Ok(true));
        assert_eq!(mono.request(&array_int, i), Ok(true));
        assert_eq!(mono.request(&pair_bool, i), Ok(false));
        assert_eq!(mono.request(&array_int, i), Ok(false));

        let names: Vec<_> = mono.instances().map(|ty| ty.mangled(i)).collect();
        assert_eq!(names, ["Pair__Bool", "Array__Int"]);
        assert_eq!(mono.next_pending(), Some(pair_bool));
        assert_eq!(mono.next_pending(), None);
    }

    #[test]
    fn distinct_keys_with_one_name_conflict() {
        let i = &mut Interner::with_capacity(16);
        well_known::register(i);
        let pair = i.intern("Pair");
        let pair_grid = i.intern("Pair-Grid");
        let grid_point = i.intern("Grid-Point");
        let point = i.intern("Point");

        let mono = &mut Monomorphizer::new();
        let first = generic(pair, Type::Struct(grid_point));
        let second = generic(pair_grid, Type::Struct(point));
        assert_eq!(mono.request(&first, i), Ok(true));
        let error = mono.request(&second, i).unwrap_err();
        assert_eq!(
            error.to_string(),
            "instances Pair<Grid-Point> and Pair-Grid<Point> both expand to Pair__Grid__Point"
        );
        assert_eq!(error.path(), "Pair__Grid__Point");
    }

    #[test]
    fn self_expanding_instances_hit_the_depth_limit() {
        let i = &mut Interner::with_capacity(16);
        well_known::register(i);
        let node = i.intern("Node");

        let mono = &mut Monomorphizer::new();
        let mut ty = Type::Int;
        let mut result = Ok(true);
        for _ in 0..=MAX_INSTANCE_DEPTH {
            ty = generic(node, ty);
            result = mono.request(&ty, i);
        }
        assert!(matches!(result, Err(Error::TooDeep { limit: 8, .. })));
        assert_eq!(mono.len(), MAX_INSTANCE_DEPTH);
    }

    #[test]
    fn substitution_reaches_nested_arguments() {
        let i = &mut Interner::with_capacity(16);
        well_known::register(i);
        let t = i.intern("T");
        let value = i.intern("value");
        let items = i.intern("items");

        let layout = StructLayout {
            fields: vec![
                (value, Type::Param(t)),
                (items, generic(well_known::ARRAY, Type::Param(t))),
            ],
        };
        let concrete = instantiate_layout(&layout, t, &Type::String);
        assert_eq!(
            concrete.fields,
            [
                (value, Type::String),
                (items, generic(well_known::ARRAY, Type::String)),
            ]
        );
        assert!(!concrete.fields.iter().any(|(_, ty)| ty.has_param()));

        let sig = FnSig {
            params: vec![Type::Param(t)],
            ret: generic(well_known::ARRAY_ITERATOR, Type::Param(t)),
        };
        assert_eq!(
            instantiate_sig(&sig, t, &Type::Int).ret,
            generic(well_known::ARRAY_ITERATOR, Type::Int)
        );
    }
}
