//! End-to-end tests of the HWID engine
//!
//! Database files, encoding and decoding across schemes, rules adjusting a
//! BOM before it is encoded, and feature compliance of the result.

use hwid_core::{
    builtins, decode, decode_hwid_string, encode, load_database, load_spec_file, save_database,
    save_spec_file, Bom, CodecError, Context, Database, EncodingScheme,
    FeatureRequirementSpec, FeatureRequirementSpecChecker, Identity, Rule, RuleError,
};
use tempfile::TempDir;

const DATABASE: &str = r#"{
    "project": "CHROMEBOOK",
    "encoding_patterns": [0, 1],
    "component_classes": ["audio", "cpu", "display", "storage"],
    "images": {
        "0": {
            "name": "EVT",
            "encoding_scheme": "base32",
            "encoded_fields": { "audio_field": 1, "cpu_field": 2, "storage_field": 1 },
            "bit_mapping": [["audio_field", 0], ["cpu_field", 0], ["storage_field", 0], ["cpu_field", 1]]
        },
        "1": {
            "name": "DVT",
            "encoding_scheme": "base8192",
            "encoded_fields": { "audio_field": 1, "board_field": 1, "cpu_field": 2 },
            "bit_mapping": [["board_field", 0], ["audio_field", 0], ["cpu_field", 0], ["cpu_field", 1]]
        },
        "2": {
            "name": "PVT",
            "encoding_scheme": "base8192",
            "encoded_fields": { "audio_field": 1, "board_field": 1, "cpu_field": 2 },
            "bit_mapping": [["cpu_field", 0], ["board_field", 0], ["audio_field", 0], ["cpu_field", 1]]
        }
    },
    "fields": {
        "audio_field": {
            "0": { "audio": ["codec_1"] },
            "1": { "audio": ["codec_2"] }
        },
        "cpu_field": {
            "0": { "cpu": ["cpu_a"] },
            "1": { "cpu": ["cpu_b"] },
            "2": { "cpu": ["cpu_c"] }
        },
        "storage_field": {
            "0": { "storage": ["ssd_small"] },
            "1": { "storage": ["ssd_large"] }
        },
        "board_field": {
            "0": { "cpu": ["cpu_a"], "display": ["panel_a"] },
            "1": { "cpu": ["cpu_b"], "display": ["panel_b"] }
        }
    }
}"#;

const FEATURE_SPEC: &str = r#"{
    "brand_specs": {
        "ABC": {
            "feature_version": 1,
            "profiles": [
                {
                    "description": "base",
                    "encoding_requirements": [
                        { "description": "audio + cpu", "bit_locations": [0, 1], "required_values": ["01"] }
                    ]
                }
            ]
        }
    }
}"#;

fn database() -> Database {
    Database::from_json(DATABASE).unwrap()
}

fn evt_bom() -> Bom {
    Bom::new(0, 0)
        .with_component("audio", ["codec_2"])
        .with_component("cpu", ["cpu_c"])
        .with_component("storage", ["ssd_large"])
}

// ============================================================================
// Codec
// ============================================================================

#[test]
fn test_round_trip_base32() {
    let db = database();
    let identity = encode(&db, &evt_bom(), Some("ABCD"), Some("E2")).unwrap();
    // audio 1, cpu 2 (bits 0 then 1), storage 1, stop bit
    assert_eq!(identity.components_bitset, "10111");
    assert!(identity.encoded_string.starts_with("CHROMEBOOK-ABCD E2 "));
    assert_eq!(decode(&db, &identity).unwrap(), evt_bom());
}

#[test]
fn test_round_trip_every_pattern() {
    let db = database();
    for pattern in [0, 1] {
        let mut bom = evt_bom();
        bom.encoding_pattern_index = pattern;
        let identity = encode(&db, &bom, None, None).unwrap();
        assert_eq!(identity.encoding_pattern_index, pattern);
        assert_eq!(decode(&db, &identity).unwrap(), bom);
    }
}

#[test]
fn test_round_trip_base8192_with_shared_class() {
    let db = database();
    let bom = Bom::new(0, 1)
        .with_component("audio", ["codec_1"])
        .with_component("cpu", ["cpu_b"])
        .with_component("display", ["panel_b"]);
    let identity = encode(&db, &bom, None, None).unwrap();
    assert_eq!(decode(&db, &identity).unwrap(), bom);

    let (parsed, decoded) = decode_hwid_string(&db, &identity.encoded_string).unwrap();
    assert_eq!(parsed, identity);
    assert_eq!(decoded, bom);
}

#[test]
fn test_encoding_is_referentially_transparent() {
    let db = database();
    let first = encode(&db, &evt_bom(), Some("ABCD"), None).unwrap();
    let second = encode(&db, &evt_bom(), Some("ABCD"), None).unwrap();
    assert_eq!(first, second);
    assert_eq!(decode(&db, &first).unwrap(), decode(&db, &second).unwrap());
}

#[test]
fn test_later_field_in_bit_mapping_wins() {
    let db = database();
    assert_eq!(db.class_collisions().len(), 2);

    // Image 1 maps board_field first: cpu_field overwrites the cpu class.
    // board index 1 (cpu_b, panel_b), audio 0, cpu 0 (cpu_a)
    let scheme = db.encoding_scheme(1).unwrap();
    let identity = Identity::generate(scheme, "CHROMEBOOK", 0, 1, "10001", None, None).unwrap();
    let bom = decode(&db, &identity).unwrap();
    assert_eq!(bom.component("cpu"), ["cpu_a".to_string()]);
    assert_eq!(bom.component("display"), ["panel_b".to_string()]);

    // Image 2 maps cpu_field first: board_field overwrites it.
    // cpu bit 0 = 0, board 1, audio 0, cpu bit 1 = 0
    let scheme = db.encoding_scheme(2).unwrap();
    let identity = Identity::generate(scheme, "CHROMEBOOK", 0, 2, "01001", None, None).unwrap();
    let bom = decode(&db, &identity).unwrap();
    assert_eq!(bom.component("cpu"), ["cpu_b".to_string()]);
}

#[test]
fn test_scheme_confusion_is_rejected() {
    let db = database();
    // Image 1 declares base8192
    let identity =
        Identity::generate(EncodingScheme::Base32, "CHROMEBOOK", 0, 1, "00001", None, None)
            .unwrap();
    assert!(matches!(
        decode(&db, &identity),
        Err(CodecError::SchemeMismatch(_))
    ));
    assert!(decode_hwid_string(&db, &identity.encoded_string).is_err());
}

#[test]
fn test_project_checked_before_bits() {
    let db = database();
    let identity =
        Identity::generate(EncodingScheme::Base32, "NOTEBOOK", 0, 0, "1", None, None).unwrap();
    assert_eq!(
        decode(&db, &identity),
        Err(CodecError::ProjectMismatch {
            expected: "CHROMEBOOK".into(),
            actual: "NOTEBOOK".into()
        })
    );
}

#[test]
fn test_unknown_image_is_rejected() {
    let db = database();
    let identity =
        Identity::generate(EncodingScheme::Base32, "CHROMEBOOK", 0, 7, "1", None, None).unwrap();
    assert_eq!(decode(&db, &identity), Err(CodecError::InvalidImageId(7)));
}

#[test]
fn test_database_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db.json");
    save_database(&path, &database()).unwrap();
    assert_eq!(load_database(&path).unwrap(), database());
}

// ============================================================================
// Rules
// ============================================================================

#[test]
fn test_string_rule_scenario() {
    let mut ctx = Context::new().with_string("12345");

    let passing = Rule::new("len", "AssertStrLen(3)").when("StrLen() > 3");
    assert!(passing.evaluate(builtins(), &mut ctx).is_ok());

    let failing = Rule::new("len", "AssertStrLen(6)").when("StrLen() > 3");
    match failing.evaluate(builtins(), &mut ctx) {
        Err(err @ RuleError::Failed { .. }) => {
            assert!(err.to_string().contains("ERROR: Assertion error"))
        }
        other => panic!("expected a rule failure, got {:?}", other),
    }
}

#[test]
fn test_rules_adjust_bom_before_encoding() {
    let db = database();
    let mut bom = evt_bom();
    bom.set_component("cpu", ["cpu_c_rev2"]);

    let mut ctx = Context::new().with_bom(bom);
    let rule = Rule::new("cpu revision", "SetComponent('cpu', 'cpu_c')")
        .when("ComponentEq('cpu', 'cpu_c_rev2')");
    rule.evaluate(builtins(), &mut ctx).unwrap();

    let bom = ctx.into_bom().unwrap();
    assert_eq!(decode(&db, &encode(&db, &bom, None, None).unwrap()).unwrap(), bom);
}

// ============================================================================
// Feature compliance
// ============================================================================

#[test]
fn test_feature_version_from_spec_file() {
    let db = database();
    let spec: FeatureRequirementSpec = serde_json::from_str(FEATURE_SPEC).unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("feature.spec");
    save_spec_file(&path, &spec).unwrap();
    let checker = FeatureRequirementSpecChecker::new(load_spec_file(&path).unwrap()).unwrap();

    // audio 0, cpu bit 0 = 1 -> bit string starts "01"
    let bom = Bom::new(0, 0)
        .with_component("audio", ["codec_1"])
        .with_component("cpu", ["cpu_b"])
        .with_component("storage", ["ssd_small"]);
    let branded = encode(&db, &bom, Some("ABC"), None).unwrap();
    assert_eq!(checker.check_feature_compliance_version(&branded), 1);

    let unbranded = encode(&db, &bom, None, None).unwrap();
    assert_eq!(checker.check_feature_compliance_version(&unbranded), 0);

    let other = encode(&db, &evt_bom(), Some("ABC"), None).unwrap();
    assert_eq!(checker.check_feature_compliance_version(&other), 0);
}

#[test]
fn test_tampered_spec_file_is_rejected() {
    let spec: FeatureRequirementSpec = serde_json::from_str(FEATURE_SPEC).unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("feature.spec");
    save_spec_file(&path, &spec).unwrap();

    let source = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, source.replace("\"01\"", "\"10\"")).unwrap();
    assert!(load_spec_file(&path).is_err());
}
