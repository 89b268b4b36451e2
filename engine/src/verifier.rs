use {
    crate::{error::BatchVerifierError, proof::LedgerProof, txn::ProcessedTxn},
    log::*,
};

/// Checks a batch as a whole once every transaction in it has verified.
pub trait BatchVerifier: Send + Sync {
    /// `proof` is present only for durable commits.
    fn verify(
        &self,
        txns: &[ProcessedTxn],
        proof: Option<&LedgerProof>,
    ) -> Result<(), BatchVerifierError>;
}

/// Ends the batch at an epoch change and holds the signed proof to the
/// validator set the ledger itself elected.
#[derive(Debug, Default)]
pub struct EpochProofVerifier;

impl BatchVerifier for EpochProofVerifier {
    fn verify(
        &self,
        txns: &[ProcessedTxn],
        proof: Option<&LedgerProof>,
    ) -> Result<(), BatchVerifierError> {
        let epoch_change = txns
            .iter()
            .position(ProcessedTxn::is_epoch_change);
        if let Some(position) = epoch_change {
            if position + 1 < txns.len() {
                return Err(BatchVerifierError::TxnAfterEpochChange {
                    index: position + 1,
                });
            }
        }

        let Some(proof) = proof else {
            return Ok(());
        };
        let computed = epoch_change.and_then(|position| txns[position].next_validator_set());
        match (computed, &proof.next_validator_set) {
            (None, None) => Ok(()),
            (Some(_), None) => Err(BatchVerifierError::MissingNextValidatorSet),
            (None, Some(_)) => Err(BatchVerifierError::UnexpectedNextValidatorSet),
            (Some((epoch, computed)), Some(signed)) => {
                if computed != signed {
                    error!(
                        "validator set for epoch {epoch} computed as {computed:?} but signed as {signed:?}"
                    );
                    return Err(BatchVerifierError::ValidatorSetMismatch {
                        computed: computed.clone(),
                        signed: signed.clone(),
                    });
                }
                Ok(())
            }
        }
    }
}
