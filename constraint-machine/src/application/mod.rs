//! Application procedures registered with the constraint machine.

pub mod system;
pub mod tokens;
pub mod validators;

use {
    crate::{
        config::RulesConfig,
        procedure::{ProcedureRegistryError, Procedures},
    },
    log::*,
};

/// A group of procedures that together implement one part of the
/// application.
pub trait ConstraintScrypt {
    fn name(&self) -> &'static str;

    fn procedures(&self) -> Result<Procedures, ProcedureRegistryError>;
}

pub fn load_scrypts(
    scrypts: &[&dyn ConstraintScrypt],
) -> Result<Procedures, ProcedureRegistryError> {
    scrypts.iter().try_fold(Procedures::new(), |loaded, scrypt| {
        let procedures = scrypt.procedures()?;
        debug!(
            "loading {} procedures from {}",
            procedures.len(),
            scrypt.name()
        );
        loaded.combine(procedures)
    })
}

/// Every application procedure, configured by `config`.
pub fn standard_procedures(config: &RulesConfig) -> Result<Procedures, ProcedureRegistryError> {
    load_scrypts(&[
        &system::SystemConstraintScrypt::new(config.max_rounds, config.max_validators),
        &tokens::TokensConstraintScrypt,
        &validators::ValidatorConstraintScrypt::new(config.min_stake),
    ])
}
