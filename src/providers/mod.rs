//! Provider adapters.
//!
//! Every provider is described by a [`MappingTable`]; [`TableProvider`]
//! executes a table against a raw payload. [`Provider`] is the seam a
//! hand-written adapter would implement instead.

mod adapter;
pub mod scodoc;

use std::sync::Arc;

use serde_json::Value;

use crate::error::NormalizeError;
use crate::ids::IdGenerator;
use crate::mapping::{AggregationPolicy, MappingTable};
use crate::schema::{Field, GradeRecord, Subject};

pub use adapter::TableProvider;

/// One subject and the records extracted under it, in payload order.
#[derive(Debug, Clone)]
pub struct SubjectGrades {
    pub subject: Arc<Subject>,
    pub records: Vec<GradeRecord>,
}

/// Everything an adapter pulls out of a payload.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub groups: Vec<SubjectGrades>,
    pub overall: Field<f64>,
    pub class_overall: Field<f64>,
}

/// Converts one provider's raw payload into common records.
pub trait Provider {
    fn name(&self) -> &str;

    /// Which records take part in subject averages for this provider.
    fn policy(&self) -> AggregationPolicy;

    /// # Errors
    ///
    /// Returns [`NormalizeError::MalformedPayload`] when the payload lacks
    /// the structure the provider expects.
    fn extract(
        &self,
        payload: &Value,
        ids: &mut dyn IdGenerator,
    ) -> Result<Extraction, NormalizeError>;
}

/// Providers that ship with the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ProviderKind {
    /// ScoDoc bulletins (IUT Lannion)
    Scodoc,
}

impl ProviderKind {
    pub fn all() -> &'static [ProviderKind] {
        &[ProviderKind::Scodoc]
    }

    pub fn table(self) -> MappingTable {
        match self {
            ProviderKind::Scodoc => scodoc::table(),
        }
    }

    pub fn provider(self) -> TableProvider {
        // Built-in tables are validated in their own tests.
        TableProvider::new_unchecked(self.table())
    }
}
