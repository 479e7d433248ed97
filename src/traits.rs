//! Type and property trait flags

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// How values of a type behave, plus a few catalog markers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct TypeTraits: u32 {
        const REFERENCE = 1;
        const VALUE = 1 << 1;
        const SEQUENCE = 1 << 2;
        const IS_ENUM = 1 << 3;
        const IS_FILE_COMPONENT = 1 << 4;
        const IS_PROJECT_COMPONENT = 1 << 5;
        const USES_CUSTOM_PARSER = 1 << 6;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct PropertyDeclarationTraits: u32 {
        const IS_LIST = 1;
        const IS_POINTER = 1 << 1;
        const IS_READ_ONLY = 1 << 2;
    }
}

impl TypeTraits {
    /// Kind name used in CLI output
    pub fn kind_str(&self) -> &'static str {
        if self.contains(TypeTraits::SEQUENCE) {
            "sequence"
        } else if self.contains(TypeTraits::VALUE) {
            "value"
        } else if self.contains(TypeTraits::REFERENCE) {
            "reference"
        } else {
            "none"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_survive_storage_roundtrip() {
        let traits = PropertyDeclarationTraits::IS_LIST | PropertyDeclarationTraits::IS_READ_ONLY;
        let restored = PropertyDeclarationTraits::from_bits_retain(traits.bits());
        assert_eq!(restored, traits);
    }

    #[test]
    fn test_kind_str() {
        assert_eq!(TypeTraits::REFERENCE.kind_str(), "reference");
        assert_eq!((TypeTraits::VALUE | TypeTraits::IS_ENUM).kind_str(), "value");
        assert_eq!(TypeTraits::empty().kind_str(), "none");
    }
}
