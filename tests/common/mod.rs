#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use serde_json::{json, Value};
use uuid::Uuid;

use field_vault::crypto::{derive_key, Codec, DecryptionError, EncryptionError, FieldCipher, KeyMaterial};
use field_vault::database::{MemoryStore, RowData, SchemaRegistry};
use field_vault::services::VaultService;

pub const TEST_SECRET: &str = "test-key-32-chars-long-example12";
pub const OTHER_SECRET: &str = "another-test-key-32-characters!!";

/// PBKDF2 is slow on purpose; derive each test key once per test binary
pub fn test_key() -> Arc<KeyMaterial> {
    static KEY: OnceLock<Arc<KeyMaterial>> = OnceLock::new();
    KEY.get_or_init(|| Arc::new(derive_key(TEST_SECRET).expect("derive test key")))
        .clone()
}

pub fn other_key() -> Arc<KeyMaterial> {
    static KEY: OnceLock<Arc<KeyMaterial>> = OnceLock::new();
    KEY.get_or_init(|| Arc::new(derive_key(OTHER_SECRET).expect("derive other key")))
        .clone()
}

pub fn codec() -> Codec {
    Codec::new(test_key())
}

/// Codec wrapper that counts calls so tests can observe caching
#[derive(Default)]
pub struct CountingCipher {
    inner: Option<Codec>,
    encrypts: AtomicUsize,
    decrypts: AtomicUsize,
}

impl CountingCipher {
    pub fn new() -> Self {
        Self {
            inner: Some(codec()),
            ..Default::default()
        }
    }

    pub fn encrypts(&self) -> usize {
        self.encrypts.load(Ordering::SeqCst)
    }

    pub fn decrypts(&self) -> usize {
        self.decrypts.load(Ordering::SeqCst)
    }

    fn inner(&self) -> &Codec {
        self.inner.as_ref().expect("counting cipher without codec")
    }
}

impl FieldCipher for CountingCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        self.encrypts.fetch_add(1, Ordering::SeqCst);
        self.inner().encrypt(plaintext)
    }

    fn decrypt(&self, payload: &str) -> Result<String, DecryptionError> {
        self.decrypts.fetch_add(1, Ordering::SeqCst);
        self.inner().decrypt(payload)
    }
}

/// `times` nested layers of encryption around `plaintext`
pub fn encrypt_layers(plaintext: &str, times: usize) -> String {
    let codec = codec();
    (0..times).fold(plaintext.to_string(), |value, _| {
        codec.encrypt(&value).expect("encrypt layer")
    })
}

pub fn row(id: Uuid, fields: Value) -> RowData {
    let mut row: RowData = match fields {
        Value::Object(map) => map.into_iter().collect(),
        _ => RowData::new(),
    };
    row.insert("id".to_string(), json!(id.to_string()));
    row
}

/// Ids in ascending order, matching store page order
pub fn sorted_ids(n: usize) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
    ids.sort();
    ids
}

pub struct TestVault {
    pub store: Arc<MemoryStore>,
    pub cipher: Arc<CountingCipher>,
    pub service: Arc<VaultService>,
}

pub fn vault() -> TestVault {
    let store = Arc::new(MemoryStore::new());
    let cipher = Arc::new(CountingCipher::new());
    let service = Arc::new(VaultService::new(
        store.clone(),
        cipher.clone(),
        SchemaRegistry::builtin(),
    ));
    TestVault { store, cipher, service }
}
