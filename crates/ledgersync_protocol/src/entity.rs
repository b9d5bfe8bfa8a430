//! Entity model: the five replicated entity kinds and their payloads.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a replicated entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A supplier the field agent collects from and pays.
    Supplier,
    /// A product that can be collected.
    Product,
    /// A versioned rate for a product. Append-only: rate changes are new
    /// RateVersion entities, never in-place updates.
    RateVersion,
    /// A recorded collection from a supplier. Monetary.
    Collection,
    /// A payment made to a supplier. Monetary.
    Payment,
}

impl EntityType {
    /// All entity types, in pull ordering.
    pub const ALL: [EntityType; 5] = [
        EntityType::Supplier,
        EntityType::Product,
        EntityType::RateVersion,
        EntityType::Collection,
        EntityType::Payment,
    ];

    /// Returns true for entity kinds carrying money, which require an
    /// idempotency key at creation.
    pub fn is_monetary(&self) -> bool {
        matches!(self, EntityType::Collection | EntityType::Payment)
    }
}

/// Payload fields for a supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierPayload {
    /// Display name.
    pub name: String,
    /// Contact phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Collection region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Whether the supplier is active.
    pub active: bool,
}

/// Payload fields for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPayload {
    /// Display name.
    pub name: String,
    /// Unit of measure (e.g. "kg").
    pub unit: String,
    /// Whether the product is active.
    pub active: bool,
}

/// Payload fields for a rate version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateVersionPayload {
    /// Product this rate applies to.
    pub product_id: Uuid,
    /// Rate in minor currency units per product unit.
    pub rate_minor: i64,
    /// When this rate takes effect (Unix millis).
    pub effective_from_ms: i64,
}

/// Payload fields for a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionPayload {
    /// Supplier collected from.
    pub supplier_id: Uuid,
    /// Product collected.
    pub product_id: Uuid,
    /// Rate version used to price this collection.
    pub rate_version_id: Uuid,
    /// Quantity in grams.
    pub quantity_grams: i64,
    /// Total amount in minor currency units.
    pub amount_minor: i64,
    /// When the collection happened (Unix millis).
    pub collected_at_ms: i64,
    /// Free-form note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Payload fields for a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPayload {
    /// Supplier paid.
    pub supplier_id: Uuid,
    /// Amount in minor currency units.
    pub amount_minor: i64,
    /// Payment method (e.g. "cash", "bank").
    pub method: String,
    /// When the payment was made (Unix millis).
    pub paid_at_ms: i64,
    /// External reference (receipt or transaction number).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

/// Entity payload, tagged by kind.
///
/// The sync engine treats payloads as opaque apart from their kind; the
/// tagged union keeps each kind strongly typed so applying an operation
/// cannot mix up field sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityPayload {
    /// Supplier fields.
    Supplier(SupplierPayload),
    /// Product fields.
    Product(ProductPayload),
    /// Rate version fields.
    RateVersion(RateVersionPayload),
    /// Collection fields.
    Collection(CollectionPayload),
    /// Payment fields.
    Payment(PaymentPayload),
}

impl EntityPayload {
    /// Returns the entity type this payload belongs to.
    pub fn entity_type(&self) -> EntityType {
        match self {
            EntityPayload::Supplier(_) => EntityType::Supplier,
            EntityPayload::Product(_) => EntityType::Product,
            EntityPayload::RateVersion(_) => EntityType::RateVersion,
            EntityPayload::Collection(_) => EntityType::Collection,
            EntityPayload::Payment(_) => EntityType::Payment,
        }
    }
}

/// A server-authoritative entity row as exchanged during pull.
///
/// `version` starts at 1 and increments by exactly 1 on every accepted
/// mutation; it is the sole arbiter of "newer". `sequence` is the server's
/// monotonic commit counter used for pull watermarking. Deletion is a
/// tombstone (`deleted_at_ms`), never a physical removal, so deletes
/// propagate to devices that have not yet seen them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Entity kind.
    pub entity_type: EntityType,
    /// Globally unique id, assigned at creation by whichever side created
    /// the entity, never reassigned.
    pub entity_id: Uuid,
    /// Version, starting at 1.
    pub version: u64,
    /// Current payload.
    pub payload: EntityPayload,
    /// Tombstone marker (Unix millis), if soft-deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at_ms: Option<i64>,
    /// Server timestamp of the last accepted mutation (Unix millis).
    pub updated_at_ms: i64,
    /// Server commit sequence of the last accepted mutation.
    pub sequence: u64,
}

impl EntityRecord {
    /// Creates a version-1 record for a freshly created entity.
    pub fn created(entity_id: Uuid, payload: EntityPayload, updated_at_ms: i64) -> Self {
        Self {
            entity_type: payload.entity_type(),
            entity_id,
            version: 1,
            payload,
            deleted_at_ms: None,
            updated_at_ms,
            sequence: 0,
        }
    }

    /// Returns true if this record is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at_ms.is_some()
    }

    /// Returns a copy with the payload replaced and the version bumped.
    pub fn with_payload(&self, payload: EntityPayload, updated_at_ms: i64) -> Self {
        Self {
            payload,
            version: self.version + 1,
            updated_at_ms,
            ..self.clone()
        }
    }

    /// Returns a tombstoned copy with the version bumped.
    pub fn with_tombstone(&self, deleted_at_ms: i64) -> Self {
        Self {
            deleted_at_ms: Some(deleted_at_ms),
            version: self.version + 1,
            updated_at_ms: deleted_at_ms,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supplier_payload(name: &str) -> EntityPayload {
        EntityPayload::Supplier(SupplierPayload {
            name: name.into(),
            phone: None,
            region: Some("north".into()),
            active: true,
        })
    }

    #[test]
    fn payload_kind_tag() {
        let json = serde_json::to_value(supplier_payload("Asha")).unwrap();
        assert_eq!(json["kind"], "supplier");
        assert_eq!(json["name"], "Asha");

        let back: EntityPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.entity_type(), EntityType::Supplier);
    }

    #[test]
    fn monetary_kinds() {
        assert!(EntityType::Collection.is_monetary());
        assert!(EntityType::Payment.is_monetary());
        assert!(!EntityType::Supplier.is_monetary());
        assert!(!EntityType::RateVersion.is_monetary());
    }

    #[test]
    fn created_record_starts_at_version_one() {
        let record = EntityRecord::created(Uuid::new_v4(), supplier_payload("Asha"), 1000);
        assert_eq!(record.version, 1);
        assert_eq!(record.entity_type, EntityType::Supplier);
        assert!(!record.is_deleted());
    }

    #[test]
    fn with_payload_bumps_version() {
        let record = EntityRecord::created(Uuid::new_v4(), supplier_payload("Asha"), 1000);
        let updated = record.with_payload(supplier_payload("Asha Devi"), 2000);

        assert_eq!(updated.version, 2);
        assert_eq!(updated.updated_at_ms, 2000);
        assert_eq!(updated.entity_id, record.entity_id);
    }

    #[test]
    fn tombstone_bumps_version_and_keeps_payload() {
        let record = EntityRecord::created(Uuid::new_v4(), supplier_payload("Asha"), 1000);
        let deleted = record.with_tombstone(3000);

        assert_eq!(deleted.version, 2);
        assert!(deleted.is_deleted());
        assert_eq!(deleted.deleted_at_ms, Some(3000));
        assert_eq!(deleted.payload, record.payload);
    }

    #[test]
    fn record_wire_roundtrip_keeps_tombstone() {
        let record = EntityRecord::created(Uuid::new_v4(), supplier_payload("Asha"), 1000)
            .with_tombstone(2000);

        let json = serde_json::to_string(&record).unwrap();
        let back: EntityRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
