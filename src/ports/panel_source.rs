//! Panel data source port trait.

use crate::domain::error::FactorError;
use crate::domain::panel::Panel;

pub trait PanelSource {
    /// Load and schema-check a complete panel.
    fn load_panel(&self) -> Result<Panel, FactorError>;
}
