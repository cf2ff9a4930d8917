//! Port Identifiers and Wire Tags
//!
//! This module defines how connection endpoints are named (`PortRef`, the
//! pair of a module and a port name) and the closed sets of port kinds and
//! wire flavours the editor distinguishes.

use crate::module::ModuleId;
use serde::{Deserialize, Serialize};

/// One endpoint of a connection: a module and the name of one of its ports.
///
/// For audio connections the name is an inlet or outlet; for data
/// connections it is a parameter id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRef {
    pub module: ModuleId,
    pub port: String,
}

impl PortRef {
    pub fn new(module: ModuleId, port: impl Into<String>) -> Self {
        Self {
            module,
            port: port.into(),
        }
    }
}

/// How a data connection transmits a parameter value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataMode {
    /// Fraction of the destination's configured range
    Relative,
    /// Raw value
    Absolute,
}

/// Hit-region kinds of a module's connectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    Inlet,
    Outlet,
    ParamInput,
    ParamOutputRelative,
    ParamOutputAbsolute,
}

impl PortKind {
    /// Data mode of a parameter output connector
    pub fn data_mode(self) -> Option<DataMode> {
        match self {
            PortKind::ParamOutputRelative => Some(DataMode::Relative),
            PortKind::ParamOutputAbsolute => Some(DataMode::Absolute),
            PortKind::Inlet | PortKind::Outlet | PortKind::ParamInput => None,
        }
    }

    /// Output connector kind for a data mode
    pub fn param_output(mode: DataMode) -> PortKind {
        match mode {
            DataMode::Relative => PortKind::ParamOutputRelative,
            DataMode::Absolute => PortKind::ParamOutputAbsolute,
        }
    }
}

/// Flavour of a drawn wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Audio,
    DataRelative,
    DataAbsolute,
}

impl WireType {
    pub fn data(mode: DataMode) -> WireType {
        match mode {
            DataMode::Relative => WireType::DataRelative,
            DataMode::Absolute => WireType::DataAbsolute,
        }
    }

    pub fn is_audio(self) -> bool {
        matches!(self, WireType::Audio)
    }

    /// Data mode of a data wire; `None` for audio
    pub fn data_mode(self) -> Option<DataMode> {
        match self {
            WireType::Audio => None,
            WireType::DataRelative => Some(DataMode::Relative),
            WireType::DataAbsolute => Some(DataMode::Absolute),
        }
    }
}

/// What releasing a candidate wire would do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WireMode {
    #[default]
    None,
    New,
    Remove,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_kind_modes() {
        assert_eq!(PortKind::ParamOutputRelative.data_mode(), Some(DataMode::Relative));
        assert_eq!(PortKind::Inlet.data_mode(), None);
        assert_eq!(PortKind::param_output(DataMode::Absolute), PortKind::ParamOutputAbsolute);
    }

    #[test]
    fn test_wire_type_for_mode() {
        assert_eq!(WireType::data(DataMode::Relative), WireType::DataRelative);
        assert!(WireType::Audio.is_audio());
        assert!(!WireType::DataAbsolute.is_audio());
        assert_eq!(WireType::DataAbsolute.data_mode(), Some(DataMode::Absolute));
        assert_eq!(WireType::Audio.data_mode(), None);
    }

    #[test]
    fn test_port_ref_equality_is_structural() {
        let module = ModuleId::default();
        assert_eq!(PortRef::new(module, "out"), PortRef::new(module, String::from("out")));
        assert_ne!(PortRef::new(module, "out"), PortRef::new(module, "in"));
    }
}
