//! Proptest generators for property-based testing.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use vaultline_core::{
    Address, BlobId, DatasetId, EntryId, Keypair, ManifestEntry, Metadata, MetadataValue,
    Sha256Hash,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random hash.
pub fn sha256_hash() -> impl Strategy<Value = Sha256Hash> {
    any::<[u8; 32]>().prop_map(Sha256Hash::from_bytes)
}

/// Generate an identifier-shaped string.
pub fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,23}".prop_map(String::from)
}

/// Generate a dataset id.
pub fn dataset_id() -> impl Strategy<Value = DatasetId> {
    ident().prop_filter_map("non-empty", |s| DatasetId::new(s).ok())
}

/// Generate a blob id.
pub fn blob_id() -> impl Strategy<Value = BlobId> {
    ident().prop_filter_map("non-empty", |s| BlobId::new(s).ok())
}

/// Generate an address, sometimes with mixed case and padding.
pub fn address() -> impl Strategy<Value = Address> {
    "[ ]?0x[a-fA-F0-9]{4,40}[ ]?".prop_filter_map("valid address", |s| Address::new(s).ok())
}

/// Generate a set of distinct addresses.
pub fn addresses(max: usize) -> impl Strategy<Value = BTreeSet<Address>> {
    prop::collection::btree_set(address(), 1..=max.max(1))
}

/// Generate a file path.
pub fn path() -> impl Strategy<Value = String> {
    "[a-z]{1,8}(/[a-z0-9_.]{1,12}){0,3}".prop_map(String::from)
}

/// Generate a metadata value, nested up to three levels.
///
/// Floats are finite and non-integral so their canonical text is stable.
pub fn metadata_value() -> impl Strategy<Value = MetadataValue> {
    let leaf = prop_oneof![
        Just(MetadataValue::Null),
        any::<bool>().prop_map(MetadataValue::Bool),
        any::<i64>().prop_map(MetadataValue::Int),
        (-1.0e9f64..1.0e9f64)
            .prop_filter("non-integral", |f| f.fract() != 0.0)
            .prop_map(MetadataValue::Float),
        "[ -~]{0,16}".prop_map(MetadataValue::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(MetadataValue::Array),
            prop::collection::btree_map("[a-zA-Z_]{1,8}", inner, 0..4)
                .prop_map(MetadataValue::Map),
        ]
    })
}

/// Generate a metadata map.
pub fn metadata() -> impl Strategy<Value = Metadata> {
    prop::collection::btree_map("[a-zA-Z_]{1,10}", metadata_value(), 0..5)
}

/// Parameters for generating a manifest entry.
#[derive(Debug, Clone)]
pub struct EntryParams {
    pub id: EntryId,
    pub blob_id: BlobId,
    pub path: Option<String>,
    pub metadata: Metadata,
}

impl Arbitrary for EntryParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            ident().prop_filter_map("non-empty", |s| EntryId::new(s).ok()),
            blob_id(),
            prop::option::of(path()),
            metadata(),
        )
            .prop_map(|(id, blob_id, path, metadata)| EntryParams {
                id,
                blob_id,
                path,
                metadata,
            })
            .boxed()
    }
}

/// Build an entry of `dataset` from parameters.
pub fn entry_from_params(dataset: &DatasetId, params: &EntryParams) -> ManifestEntry {
    ManifestEntry {
        id: params.id.clone(),
        dataset_id: dataset.clone(),
        blob_id: params.blob_id.clone(),
        path: params.path.clone(),
        metadata: params.metadata.clone(),
    }
}

/// Generate up to `max` entries of one dataset with distinct ids.
pub fn manifest_entries(max: usize) -> impl Strategy<Value = Vec<ManifestEntry>> {
    (
        dataset_id(),
        prop::collection::btree_map(ident(), any::<EntryParams>(), 0..=max),
    )
        .prop_map(|(dataset, by_id): (DatasetId, BTreeMap<String, EntryParams>)| {
            by_id
                .into_iter()
                .filter_map(|(id, params)| {
                    let id = EntryId::new(id).ok()?;
                    Some(entry_from_params(&dataset, &EntryParams { id, ..params }))
                })
                .collect()
        })
}
