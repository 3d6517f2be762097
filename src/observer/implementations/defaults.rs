// Helper for registering the observers every vault save needs
use std::sync::Arc;

use super::{FieldEncryptor, RecordLoader, SensitiveFieldValidator, StoreExecutor};
use crate::crypto::codec::FieldCipher;
use crate::database::store::RecordStore;
use crate::observer::pipeline::ObserverPipeline;
use crate::observer::traits::ObserverBox;

/// Register the loader, validator, encryptor and store executor
pub fn register_default_observers(
    pipeline: &mut ObserverPipeline,
    store: Arc<dyn RecordStore>,
    cipher: Arc<dyn FieldCipher>,
) {
    pipeline.register_observer(ObserverBox::DataPreparation(Box::new(RecordLoader::new(store.clone()))));
    pipeline.register_observer(ObserverBox::InputValidation(Box::new(SensitiveFieldValidator)));
    pipeline.register_observer(ObserverBox::Enrichment(Box::new(FieldEncryptor::new(cipher))));
    pipeline.register_observer(ObserverBox::Database(Box::new(StoreExecutor::new(store))));
}

impl ObserverPipeline {
    pub fn with_default_observers(store: Arc<dyn RecordStore>, cipher: Arc<dyn FieldCipher>) -> Self {
        let mut pipeline = Self::new();
        register_default_observers(&mut pipeline, store, cipher);
        pipeline
    }
}
