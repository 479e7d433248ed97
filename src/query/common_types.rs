//! Well-known types looked up by module and exported name
//!
//! Lookups are cached per catalog. After a synchronize call every entry
//! whose exported name changed is dropped and resolved again on next use.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::Serialize;

use crate::ids::TypeId;
use crate::{Error, Result};

/// A type every QML project ends up referring to
pub trait WellKnownType: Copy {
    fn module_name(self) -> &'static str;
    fn type_name(self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CommonType {
    QtObject,
    Component,
    Item,
    Text,
    Rectangle,
    ListModel,
    Window,
}

impl WellKnownType for CommonType {
    fn module_name(self) -> &'static str {
        match self {
            CommonType::QtObject | CommonType::Component => "QtQml",
            CommonType::Item | CommonType::Text | CommonType::Rectangle => "QtQuick",
            CommonType::ListModel => "QtQml.Models",
            CommonType::Window => "QtQuick.Window",
        }
    }

    fn type_name(self) -> &'static str {
        match self {
            CommonType::QtObject => "QtObject",
            CommonType::Component => "Component",
            CommonType::Item => "Item",
            CommonType::Text => "Text",
            CommonType::Rectangle => "Rectangle",
            CommonType::ListModel => "ListModel",
            CommonType::Window => "Window",
        }
    }
}

/// Value types of the QML language itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BuiltinType {
    Bool,
    Int,
    Double,
    String,
    Url,
    Date,
    Var,
}

impl WellKnownType for BuiltinType {
    fn module_name(self) -> &'static str {
        "QML"
    }

    fn type_name(self) -> &'static str {
        match self {
            BuiltinType::Bool => "bool",
            BuiltinType::Int => "int",
            BuiltinType::Double => "double",
            BuiltinType::String => "string",
            BuiltinType::Url => "url",
            BuiltinType::Date => "date",
            BuiltinType::Var => "var",
        }
    }
}

type CacheKey = (&'static str, &'static str);

#[derive(Debug, Default)]
pub struct CommonTypeCache {
    ids: RwLock<HashMap<CacheKey, Option<TypeId>>>,
}

impl CommonTypeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached lookup result; `Some(None)` is a cached miss
    pub fn get<T: WellKnownType>(&self, ty: T) -> Result<Option<Option<TypeId>>> {
        let ids = self
            .ids
            .read()
            .map_err(|_| Error::Poisoned("common type cache".to_string()))?;
        Ok(ids.get(&(ty.module_name(), ty.type_name())).copied())
    }

    pub fn insert<T: WellKnownType>(&self, ty: T, type_id: Option<TypeId>) -> Result<()> {
        self.ids
            .write()
            .map_err(|_| Error::Poisoned("common type cache".to_string()))?
            .insert((ty.module_name(), ty.type_name()), type_id);
        Ok(())
    }

    /// Drop entries for the given exported names. Returns how many were
    /// dropped.
    pub fn invalidate(&self, changed_export_names: &[String]) -> Result<usize> {
        if changed_export_names.is_empty() {
            return Ok(0);
        }
        let mut ids = self
            .ids
            .write()
            .map_err(|_| Error::Poisoned("common type cache".to_string()))?;
        let before = ids.len();
        ids.retain(|(_, name), _| !changed_export_names.iter().any(|changed| changed == name));
        Ok(before - ids.len())
    }
}
