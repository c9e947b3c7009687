//! Structural type model and the queries the pattern engine asks of it.
//!
//! This is the optional type-info collaborator: a single pass over the input
//! roots records declared names (types, vars, consts, funcs, params) and then
//! types every expression it can, bottom-up. It is deliberately not a full
//! checker — expressions it cannot type come out `Invalid` and fail every
//! type predicate. Imported package types resolve only when declared in the
//! inputs themselves; the scope is one flat table.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::syntax::ast::{walk, Ast, ChanDir, Node, NodeId};
use crate::syntax::token::TokenKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Basic,
    Array,
    Slice,
    Struct,
    Interface,
    Pointer,
    Func,
    Map,
    Chan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basic {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    Str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Untyped {
    Bool,
    Int,
    Float,
    Rune,
    Str,
    Nil,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Invalid,
    Basic(Basic),
    Untyped(Untyped),
    Named(String, Box<Type>),
    Pointer(Box<Type>),
    Slice(Box<Type>),
    Array(Option<u64>, Box<Type>),
    Map(Box<Type>, Box<Type>),
    Chan(ChanDir, Box<Type>),
    Func(Vec<Type>, Vec<Type>),
    Struct(Vec<(String, Type)>),
    /// Method names; empty for `interface{}`.
    Interface(Vec<String>),
}

impl Type {
    pub fn underlying(&self) -> &Type {
        match self {
            Type::Named(_, u) => u.underlying(),
            t => t,
        }
    }

    pub fn kind(&self) -> Option<Kind> {
        Some(match self.underlying() {
            Type::Basic(_) => Kind::Basic,
            Type::Untyped(Untyped::Nil) => return None,
            Type::Untyped(_) => Kind::Basic,
            Type::Array(..) => Kind::Array,
            Type::Slice(_) => Kind::Slice,
            Type::Struct(_) => Kind::Struct,
            Type::Interface(_) => Kind::Interface,
            Type::Pointer(_) => Kind::Pointer,
            Type::Func(..) => Kind::Func,
            Type::Map(..) => Kind::Map,
            Type::Chan(..) => Kind::Chan,
            Type::Invalid | Type::Named(..) => return None,
        })
    }

    fn is_numeric(&self) -> bool {
        match self.underlying() {
            Type::Basic(b) => !matches!(b, Basic::Bool | Basic::Str),
            Type::Untyped(u) => matches!(u, Untyped::Int | Untyped::Float | Untyped::Rune),
            _ => false,
        }
    }

    fn is_named(&self) -> bool {
        matches!(self, Type::Named(..))
    }
}

/// Strict type identity. Named types compare by name; untyped constants are
/// identical only to themselves.
pub fn identical(a: &Type, b: &Type) -> bool {
    match (a, b) {
        (Type::Named(n1, _), Type::Named(n2, _)) => n1 == n2,
        _ => a == b,
    }
}

pub fn assignable(v: &Type, t: &Type) -> bool {
    if identical(v, t) {
        return true;
    }
    match v {
        Type::Untyped(Untyped::Nil) => matches!(
            t.underlying(),
            Type::Pointer(_)
                | Type::Map(..)
                | Type::Chan(..)
                | Type::Func(..)
                | Type::Interface(_)
                | Type::Slice(_)
        ),
        Type::Untyped(Untyped::Bool) => matches!(t.underlying(), Type::Basic(Basic::Bool)),
        Type::Untyped(Untyped::Str) => matches!(t.underlying(), Type::Basic(Basic::Str)),
        Type::Untyped(Untyped::Int | Untyped::Rune | Untyped::Float) => t.is_numeric(),
        _ => {
            // the empty interface accepts anything with a type
            if matches!(t.underlying(), Type::Interface(ms) if ms.is_empty()) {
                return !matches!(v, Type::Invalid);
            }
            // identical underlying types where at least one side is unnamed
            identical(v.underlying(), t.underlying()) && (!v.is_named() || !t.is_named())
        }
    }
}

pub fn convertible(v: &Type, t: &Type) -> bool {
    if assignable(v, t) {
        return true;
    }
    if v.is_numeric() && t.is_numeric() {
        return true;
    }
    identical(v.underlying(), t.underlying())
}

pub fn comparable(t: &Type) -> bool {
    match t.underlying() {
        Type::Basic(_) => true,
        Type::Untyped(u) => *u != Untyped::Nil,
        Type::Pointer(_) | Type::Chan(..) | Type::Interface(_) => true,
        Type::Array(_, elt) => comparable(elt),
        Type::Struct(fields) => fields.iter().all(|(_, t)| comparable(t)),
        _ => false,
    }
}

#[derive(Debug, Clone)]
enum Def {
    Var(Type),
    Con(Type),
    TypeName(Type),
    Fn(Type),
}

#[derive(Default)]
pub struct TypeInfo {
    types: HashMap<NodeId, Type>,
    scope: HashMap<String, Def>,
}

impl TypeInfo {
    /// Build the table for everything reachable from `roots`.
    pub fn check(ast: &Ast, roots: &[NodeId]) -> TypeInfo {
        let mut c = Checker {
            ast,
            info: TypeInfo::default(),
            pending_types: HashMap::new(),
            pending_values: HashMap::new(),
            resolving: HashSet::new(),
        };
        c.collect(roots);
        c.resolve_pending();
        for &root in roots {
            walk(ast, root, &mut |id| {
                let t = c.type_of(id);
                if t != Type::Invalid {
                    c.info.types.insert(id, t);
                }
            });
        }
        c.info
    }

    pub fn type_of(&self, id: NodeId) -> &Type {
        self.types.get(&id).unwrap_or(&Type::Invalid)
    }

    /// Resolve a type expression (from a pipeline operator or a `$(…)` type
    /// predicate) against the checked scope.
    pub fn resolve(&self, ast: &Ast, expr: NodeId) -> Result<Type> {
        resolve_type(ast, &self.scope, expr)
    }

    /// Syntactic addressability: variables and chains of selectors, indexes,
    /// and dereferences rooted at an addressable operand.
    pub fn addressable(&self, ast: &Ast, id: NodeId) -> bool {
        match ast.node(id) {
            Node::Ident { name } => matches!(self.scope.get(name), Some(Def::Var(_))),
            Node::ParenExpr { x } => self.addressable(ast, *x),
            Node::StarExpr { .. } => true,
            Node::SelectorExpr { x, .. } => self.addressable(ast, *x),
            Node::IndexExpr { x, .. } => {
                matches!(self.type_of(*x).underlying(), Type::Slice(_))
                    || self.addressable(ast, *x)
            }
            _ => false,
        }
    }
}

fn basic_from_name(name: &str) -> Option<Type> {
    use Basic::*;
    let b = match name {
        "bool" => Bool,
        "int" => Int,
        "int8" => Int8,
        "int16" => Int16,
        "int32" | "rune" => Int32,
        "int64" => Int64,
        "uint" => Uint,
        "uint8" | "byte" => Uint8,
        "uint16" => Uint16,
        "uint32" => Uint32,
        "uint64" => Uint64,
        "uintptr" => Uintptr,
        "float32" => Float32,
        "float64" => Float64,
        "complex64" => Complex64,
        "complex128" => Complex128,
        "string" => Str,
        "error" => {
            return Some(Type::Named(
                "error".to_string(),
                Box::new(Type::Interface(vec!["Error".to_string()])),
            ))
        }
        _ => return None,
    };
    Some(Type::Basic(b))
}

fn array_len(ast: &Ast, len: Option<NodeId>) -> Option<u64> {
    let len = len?;
    match ast.node(len) {
        Node::BasicLit { kind, value } if *kind == TokenKind::Int => value.parse().ok(),
        _ => None,
    }
}

fn resolve_type(ast: &Ast, scope: &HashMap<String, Def>, expr: NodeId) -> Result<Type> {
    match ast.node(expr) {
        Node::Ident { name } => {
            if let Some(t) = basic_from_name(name) {
                return Ok(t);
            }
            match scope.get(name) {
                Some(Def::TypeName(t)) => Ok(t.clone()),
                _ => Err(Error::TypeResolve(name.clone())),
            }
        }
        Node::SelectorExpr { x, sel } => {
            let pkg = ast.ident_name(*x).unwrap_or("?");
            let name = ast.ident_name(*sel).unwrap_or("?");
            Err(Error::TypeResolve(format!("{pkg}.{name}")))
        }
        Node::ParenExpr { x } => resolve_type(ast, scope, *x),
        Node::StarExpr { x } => Ok(Type::Pointer(Box::new(resolve_type(ast, scope, *x)?))),
        Node::ArrayType { len, elt } => {
            let elt_t = Box::new(resolve_type(ast, scope, *elt)?);
            match len {
                None => Ok(Type::Slice(elt_t)),
                Some(l) if matches!(ast.node(*l), Node::Ellipsis { .. }) => {
                    Ok(Type::Array(None, elt_t))
                }
                Some(_) => Ok(Type::Array(array_len(ast, *len), elt_t)),
            }
        }
        Node::MapType { key, value } => Ok(Type::Map(
            Box::new(resolve_type(ast, scope, *key)?),
            Box::new(resolve_type(ast, scope, *value)?),
        )),
        Node::ChanType { dir, value } => Ok(Type::Chan(
            *dir,
            Box::new(resolve_type(ast, scope, *value)?),
        )),
        Node::FuncType { params, results } => {
            let mut ps = Vec::new();
            for &f in params {
                field_types(ast, scope, f, &mut ps)?;
            }
            let mut rs = Vec::new();
            for &f in results {
                field_types(ast, scope, f, &mut rs)?;
            }
            Ok(Type::Func(ps, rs))
        }
        Node::StructType { fields } => {
            let mut fs = Vec::new();
            for &f in fields {
                if let Node::Field { names, typ, .. } = ast.node(f) {
                    let Some(typ) = typ else { continue };
                    let t = resolve_type(ast, scope, *typ)?;
                    if names.is_empty() {
                        fs.push((String::new(), t));
                    } else {
                        for &n in names {
                            let name = ast.ident_name(n).unwrap_or("").to_string();
                            fs.push((name, t.clone()));
                        }
                    }
                }
            }
            Ok(Type::Struct(fs))
        }
        Node::InterfaceType { methods } => {
            let mut ms = Vec::new();
            for &f in methods {
                if let Node::Field { names, .. } = ast.node(f) {
                    for &n in names {
                        ms.push(ast.ident_name(n).unwrap_or("").to_string());
                    }
                }
            }
            Ok(Type::Interface(ms))
        }
        Node::Ellipsis { elt: Some(e) } => {
            Ok(Type::Slice(Box::new(resolve_type(ast, scope, *e)?)))
        }
        _ => Err(Error::TypeResolve(
            crate::syntax::printer::print_compact(ast, expr),
        )),
    }
}

fn field_types(
    ast: &Ast,
    scope: &HashMap<String, Def>,
    field: NodeId,
    out: &mut Vec<Type>,
) -> Result<()> {
    if let Node::Field { names, typ, .. } = ast.node(field) {
        if let Some(typ) = typ {
            let t = resolve_type(ast, scope, *typ)?;
            let n = names.len().max(1);
            for _ in 0..n {
                out.push(t.clone());
            }
        }
    }
    Ok(())
}

struct Checker<'a> {
    ast: &'a Ast,
    info: TypeInfo,
    /// type name -> its type expression, resolved after collection
    pending_types: HashMap<String, NodeId>,
    /// var/const name -> the value expression its type comes from
    pending_values: HashMap<String, (NodeId, bool)>,
    resolving: HashSet<String>,
}

impl<'a> Checker<'a> {
    fn collect(&mut self, roots: &[NodeId]) {
        for &root in roots {
            walk(self.ast, root, &mut |id| match self.ast.node(id) {
                Node::TypeSpec { name, typ, .. } => {
                    if let Some(n) = self.ast.ident_name(*name) {
                        self.pending_types.insert(n.to_string(), *typ);
                    }
                }
                _ => {}
            });
        }
        // named types first, so value declarations can reference them
        let names: Vec<String> = self.pending_types.keys().cloned().collect();
        for name in names {
            let t = self.named_type(&name);
            self.info.scope.insert(name, Def::TypeName(t));
        }
        for &root in roots {
            walk(self.ast, root, &mut |id| self.collect_values(id));
        }
    }

    fn named_type(&mut self, name: &str) -> Type {
        if let Some(Def::TypeName(t)) = self.info.scope.get(name) {
            return t.clone();
        }
        if !self.resolving.insert(name.to_string()) {
            return Type::Invalid;
        }
        let typ = self.pending_types.get(name).copied();
        let underlying = match typ {
            Some(typ) => self.resolve_or_invalid(typ),
            None => Type::Invalid,
        };
        self.resolving.remove(name);
        Type::Named(name.to_string(), Box::new(underlying))
    }

    fn resolve_or_invalid(&mut self, expr: NodeId) -> Type {
        // resolve against what is known so far; named types referenced before
        // resolution are pulled in on demand
        self.ensure_referenced(expr);
        resolve_type(self.ast, &self.info.scope, expr).unwrap_or(Type::Invalid)
    }

    fn ensure_referenced(&mut self, expr: NodeId) {
        let mut idents = Vec::new();
        walk(self.ast, expr, &mut |id| {
            if let Some(name) = self.ast.ident_name(id) {
                idents.push(name.to_string());
            }
        });
        for name in idents {
            if self.pending_types.contains_key(&name)
                && !matches!(self.info.scope.get(&name), Some(Def::TypeName(_)))
            {
                let t = self.named_type(&name);
                self.info.scope.insert(name, Def::TypeName(t));
            }
        }
    }

    fn collect_values(&mut self, id: NodeId) {
        match self.ast.node(id).clone() {
            Node::ValueSpec { names, typ, values } => {
                let declared = typ.map(|t| self.resolve_or_invalid(t));
                for (i, n) in names.iter().enumerate() {
                    let Some(name) = self.ast.ident_name(*n) else {
                        continue;
                    };
                    if name == "_" {
                        continue;
                    }
                    match (&declared, values.get(i)) {
                        (Some(t), _) => {
                            self.info.scope.insert(name.to_string(), Def::Var(t.clone()));
                        }
                        (None, Some(&v)) => {
                            self.pending_values.insert(name.to_string(), (v, false));
                        }
                        (None, None) => {}
                    }
                }
            }
            Node::AssignStmt { lhs, op, rhs } if op == TokenKind::Define => {
                if lhs.len() == rhs.len() {
                    for (n, &v) in lhs.iter().zip(&rhs) {
                        if let Some(name) = self.ast.ident_name(*n) {
                            if name != "_" && !self.info.scope.contains_key(name) {
                                self.pending_values.insert(name.to_string(), (v, false));
                            }
                        }
                    }
                }
            }
            Node::FuncDecl {
                recv, name, typ, ..
            } => {
                if let Some(n) = self.ast.ident_name(name).map(str::to_string) {
                    let t = self.resolve_or_invalid(typ);
                    self.info.scope.insert(n, Def::Fn(t));
                }
                if let Some(recv) = recv {
                    self.collect_field_vars(recv);
                }
                self.collect_signature_vars(typ);
            }
            Node::FuncLit { typ, .. } => self.collect_signature_vars(typ),
            Node::RangeStmt { key, value, op, .. } if op == TokenKind::Define => {
                for n in [key, value].into_iter().flatten() {
                    if let Some(name) = self.ast.ident_name(n) {
                        if name != "_" {
                            self.info.scope.insert(name.to_string(), Def::Var(Type::Invalid));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn collect_signature_vars(&mut self, typ: NodeId) {
        if let Node::FuncType { params, results } = self.ast.node(typ).clone() {
            for f in params.into_iter().chain(results) {
                self.collect_field_vars(f);
            }
        }
    }

    fn collect_field_vars(&mut self, field: NodeId) {
        if let Node::Field { names, typ, .. } = self.ast.node(field).clone() {
            let Some(typ) = typ else { return };
            let t = self.resolve_or_invalid(typ);
            for n in names {
                if let Some(name) = self.ast.ident_name(n) {
                    if name != "_" {
                        self.info.scope.insert(name.to_string(), Def::Var(t.clone()));
                    }
                }
            }
        }
    }

    fn resolve_pending(&mut self) {
        let pending: Vec<(String, NodeId)> = self
            .pending_values
            .iter()
            .map(|(k, (v, _))| (k.clone(), *v))
            .collect();
        for (name, value) in pending {
            if self.info.scope.contains_key(&name) {
                continue;
            }
            if !self.resolving.insert(name.clone()) {
                continue;
            }
            let t = self.type_of(value);
            self.resolving.remove(&name);
            let def = if matches!(t, Type::Untyped(_)) {
                Def::Con(t)
            } else {
                Def::Var(t)
            };
            self.info.scope.insert(name, def);
        }
    }

    fn type_of(&mut self, id: NodeId) -> Type {
        if let Some(t) = self.info.types.get(&id) {
            return t.clone();
        }
        let t = self.type_of_uncached(id);
        if t != Type::Invalid {
            self.info.types.insert(id, t.clone());
        }
        t
    }

    fn type_of_uncached(&mut self, id: NodeId) -> Type {
        match self.ast.node(id).clone() {
            Node::Ident { name } => match name.as_str() {
                "true" | "false" => Type::Untyped(Untyped::Bool),
                "nil" => Type::Untyped(Untyped::Nil),
                "iota" => Type::Untyped(Untyped::Int),
                _ => {
                    if let Some(def) = self.info.scope.get(&name) {
                        return match def {
                            Def::Var(t) | Def::Con(t) | Def::Fn(t) | Def::TypeName(t) => t.clone(),
                        };
                    }
                    if let Some((v, _)) = self.pending_values.get(&name).copied() {
                        if self.resolving.insert(name.clone()) {
                            let t = self.type_of(v);
                            self.resolving.remove(&name);
                            return t;
                        }
                        return Type::Invalid;
                    }
                    basic_from_name(&name).unwrap_or(Type::Invalid)
                }
            },
            Node::BasicLit { kind, .. } => match kind {
                TokenKind::Int => Type::Untyped(Untyped::Int),
                TokenKind::Float => Type::Untyped(Untyped::Float),
                TokenKind::String => Type::Untyped(Untyped::Str),
                TokenKind::Char => Type::Untyped(Untyped::Rune),
                _ => Type::Invalid,
            },
            Node::ParenExpr { x } => self.type_of(x),
            Node::UnaryExpr { op, x } => match op {
                TokenKind::And => Type::Pointer(Box::new(self.type_of(x))),
                TokenKind::Arrow => match self.type_of(x).underlying() {
                    Type::Chan(_, elt) => (**elt).clone(),
                    _ => Type::Invalid,
                },
                TokenKind::Not => Type::Untyped(Untyped::Bool),
                _ => self.type_of(x),
            },
            Node::StarExpr { x } => {
                if let Ok(t) = resolve_type(self.ast, &self.info.scope, x) {
                    return Type::Pointer(Box::new(t));
                }
                match self.type_of(x) {
                    Type::Pointer(elt) => (*elt).clone(),
                    _ => Type::Invalid,
                }
            }
            Node::SelectorExpr { x, sel } => {
                let name = self.ast.ident_name(sel).unwrap_or("").to_string();
                let mut xt = self.type_of(x);
                if let Type::Pointer(elt) = xt {
                    xt = (*elt).clone();
                }
                match xt.underlying() {
                    Type::Struct(fields) => fields
                        .iter()
                        .find(|(n, _)| *n == name)
                        .map(|(_, t)| t.clone())
                        .unwrap_or(Type::Invalid),
                    _ => Type::Invalid,
                }
            }
            Node::IndexExpr { x, .. } => match self.type_of(x).underlying() {
                Type::Slice(elt) | Type::Array(_, elt) => (**elt).clone(),
                Type::Map(_, v) => (**v).clone(),
                Type::Basic(Basic::Str) => Type::Basic(Basic::Uint8),
                _ => Type::Invalid,
            },
            Node::SliceExpr { x, .. } => match self.type_of(x).underlying() {
                Type::Slice(elt) | Type::Array(_, elt) => Type::Slice(elt.clone()),
                Type::Basic(Basic::Str) => Type::Basic(Basic::Str),
                Type::Pointer(p) => match p.underlying() {
                    Type::Array(_, elt) => Type::Slice(elt.clone()),
                    _ => Type::Invalid,
                },
                _ => Type::Invalid,
            },
            Node::CallExpr { fun, args, .. } => {
                if let Ok(t) = resolve_type(self.ast, &self.info.scope, fun) {
                    return t; // conversion
                }
                if let Some(name) = self.ast.ident_name(fun) {
                    match name {
                        "new" => {
                            if let Some(&arg) = args.first() {
                                if let Ok(t) = resolve_type(self.ast, &self.info.scope, arg) {
                                    return Type::Pointer(Box::new(t));
                                }
                            }
                            return Type::Invalid;
                        }
                        "make" => {
                            if let Some(&arg) = args.first() {
                                if let Ok(t) = resolve_type(self.ast, &self.info.scope, arg) {
                                    return t;
                                }
                            }
                            return Type::Invalid;
                        }
                        "len" | "cap" | "copy" => return Type::Basic(Basic::Int),
                        "append" => {
                            if let Some(&arg) = args.first() {
                                return self.type_of(arg);
                            }
                            return Type::Invalid;
                        }
                        _ => {}
                    }
                }
                match self.type_of(fun) {
                    Type::Func(_, results) if results.len() == 1 => results[0].clone(),
                    _ => Type::Invalid,
                }
            }
            Node::CompositeLit { typ: Some(t), elts } => {
                // [...]T gets its length from the literal
                if let Node::ArrayType { len: Some(l), elt } = self.ast.node(t) {
                    if matches!(self.ast.node(*l), Node::Ellipsis { .. }) {
                        let elt_t = resolve_type(self.ast, &self.info.scope, *elt)
                            .unwrap_or(Type::Invalid);
                        return Type::Array(Some(elts.len() as u64), Box::new(elt_t));
                    }
                }
                resolve_type(self.ast, &self.info.scope, t).unwrap_or(Type::Invalid)
            }
            Node::FuncLit { typ, .. } => {
                resolve_type(self.ast, &self.info.scope, typ).unwrap_or(Type::Invalid)
            }
            Node::TypeAssertExpr { typ: Some(t), .. } => {
                resolve_type(self.ast, &self.info.scope, t).unwrap_or(Type::Invalid)
            }
            Node::BinaryExpr { op, x, y } => match op {
                TokenKind::Eql
                | TokenKind::Neq
                | TokenKind::Lss
                | TokenKind::Leq
                | TokenKind::Gtr
                | TokenKind::Geq
                | TokenKind::LAnd
                | TokenKind::LOr => Type::Untyped(Untyped::Bool),
                _ => {
                    let tx = self.type_of(x);
                    if matches!(tx, Type::Untyped(_) | Type::Invalid) {
                        self.type_of(y)
                    } else {
                        tx
                    }
                }
            },
            Node::ArrayType { .. }
            | Node::MapType { .. }
            | Node::ChanType { .. }
            | Node::StructType { .. }
            | Node::InterfaceType { .. }
            | Node::FuncType { .. } => {
                resolve_type(self.ast, &self.info.scope, id).unwrap_or(Type::Invalid)
            }
            _ => Type::Invalid,
        }
    }
}
