//! Protobuf text format of a feature requirement spec
//!
//! The message schema is built as a descriptor at runtime and read through
//! dynamic messages, so no generated code is involved:
//!
//! ```text
//! message FeatureRequirementSpec { map<string, BrandSpec> brand_specs = 1; }
//! message BrandSpec { uint32 feature_version = 1; repeated Profile profiles = 2; }
//! message Profile { string description = 1; repeated EncodingRequirement encoding_requirements = 2; }
//! message EncodingRequirement {
//!   string description = 1;
//!   repeated uint32 bit_locations = 2;
//!   repeated string required_values = 3;
//! }
//! ```
//!
//! `brand_specs` is declared as a repeated key/value entry, which has the same
//! text form as a map field.

use protobuf::descriptor::field_descriptor_proto::{Label, Type};
use protobuf::descriptor::{DescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use protobuf::reflect::{
    FieldDescriptor, FileDescriptor, MessageDescriptor, MessageRef, ReflectValueBox,
    ReflectValueRef,
};
use protobuf::{text_format, MessageDyn};

use hwid_error::SpecError;

use super::spec::{BrandSpec, EncodingRequirement, FeatureRequirementSpec, Profile};

const PACKAGE: &str = "hwid.feature";

// ============================================================================
// Schema
// ============================================================================

fn field(
    name: &str,
    number: i32,
    label: Label,
    kind: Type,
    type_name: Option<&str>,
) -> FieldDescriptorProto {
    let mut field = FieldDescriptorProto::new();
    field.set_name(name.to_string());
    field.set_number(number);
    field.set_label(label);
    field.set_type(kind);
    if let Some(type_name) = type_name {
        field.set_type_name(format!(".{}.{}", PACKAGE, type_name));
    }
    field
}

fn message(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    let mut message = DescriptorProto::new();
    message.set_name(name.to_string());
    message.field = fields;
    message
}

fn file_descriptor() -> Result<FileDescriptor, SpecError> {
    use Label::{LABEL_OPTIONAL as OPTIONAL, LABEL_REPEATED as REPEATED};

    let mut file = FileDescriptorProto::new();
    file.set_name("hwid/feature_requirement_spec.proto".to_string());
    file.set_package(PACKAGE.to_string());
    file.set_syntax("proto3".to_string());
    file.message_type = vec![
        message(
            "FeatureRequirementSpec",
            vec![field("brand_specs", 1, REPEATED, Type::TYPE_MESSAGE, Some("BrandSpecsEntry"))],
        ),
        message(
            "BrandSpecsEntry",
            vec![
                field("key", 1, OPTIONAL, Type::TYPE_STRING, None),
                field("value", 2, OPTIONAL, Type::TYPE_MESSAGE, Some("BrandSpec")),
            ],
        ),
        message(
            "BrandSpec",
            vec![
                field("feature_version", 1, OPTIONAL, Type::TYPE_UINT32, None),
                field("profiles", 2, REPEATED, Type::TYPE_MESSAGE, Some("Profile")),
            ],
        ),
        message(
            "Profile",
            vec![
                field("description", 1, OPTIONAL, Type::TYPE_STRING, None),
                field(
                    "encoding_requirements",
                    2,
                    REPEATED,
                    Type::TYPE_MESSAGE,
                    Some("EncodingRequirement"),
                ),
            ],
        ),
        message(
            "EncodingRequirement",
            vec![
                field("description", 1, OPTIONAL, Type::TYPE_STRING, None),
                field("bit_locations", 2, REPEATED, Type::TYPE_UINT32, None),
                field("required_values", 3, REPEATED, Type::TYPE_STRING, None),
            ],
        ),
    ];

    FileDescriptor::new_dynamic(file, &[])
        .map_err(|e| SpecError::Body(format!("invalid spec schema: {}", e)))
}

/// Descriptors of every message in the schema
struct Schema {
    file: FileDescriptor,
}

impl Schema {
    fn new() -> Result<Self, SpecError> {
        Ok(Self {
            file: file_descriptor()?,
        })
    }

    fn message(&self, name: &str) -> Result<MessageDescriptor, SpecError> {
        self.file
            .message_by_package_relative_name(name)
            .ok_or_else(|| SpecError::Body(format!("schema has no message {}", name)))
    }
}

fn field_of(descriptor: &MessageDescriptor, name: &str) -> Result<FieldDescriptor, SpecError> {
    descriptor
        .field_by_name(name)
        .ok_or_else(|| SpecError::Body(format!("{} has no field {}", descriptor.name(), name)))
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a text format body
pub fn parse_spec_body(body: &str) -> Result<FeatureRequirementSpec, SpecError> {
    let schema = Schema::new()?;
    let descriptor = schema.message("FeatureRequirementSpec")?;
    let mut root = descriptor.new_instance();
    text_format::merge_from_str(&mut *root, body)
        .map_err(|e| SpecError::Body(e.to_string()))?;

    let mut spec = FeatureRequirementSpec::default();
    let entries = field_of(&descriptor, "brand_specs")?.get_repeated(&*root);
    for i in 0..entries.len() {
        let entry = as_message(entries.get(i))?;
        let entry_descriptor = entry.descriptor_dyn();
        let brand = as_string(
            field_of(&entry_descriptor, "key")?.get_singular_field_or_default(&*entry),
        )?;
        let value = as_message(
            field_of(&entry_descriptor, "value")?.get_singular_field_or_default(&*entry),
        )?;
        if spec.brand_specs.insert(brand.clone(), read_brand(&*value)?).is_some() {
            return Err(SpecError::Body(format!("brand {} is listed twice", brand)));
        }
    }
    Ok(spec)
}

fn read_brand(message: &dyn MessageDyn) -> Result<BrandSpec, SpecError> {
    let descriptor = message.descriptor_dyn();
    let feature_version = field_of(&descriptor, "feature_version")?
        .get_singular_field_or_default(message)
        .to_u32()
        .ok_or_else(|| SpecError::Body("feature_version is not a uint32".into()))?;

    let repeated = field_of(&descriptor, "profiles")?.get_repeated(message);
    let mut profiles = Vec::with_capacity(repeated.len());
    for i in 0..repeated.len() {
        profiles.push(read_profile(&*as_message(repeated.get(i))?)?);
    }
    Ok(BrandSpec {
        feature_version,
        profiles,
    })
}

fn read_profile(message: &dyn MessageDyn) -> Result<Profile, SpecError> {
    let descriptor = message.descriptor_dyn();
    let description =
        as_string(field_of(&descriptor, "description")?.get_singular_field_or_default(message))?;

    let repeated = field_of(&descriptor, "encoding_requirements")?.get_repeated(message);
    let mut encoding_requirements = Vec::with_capacity(repeated.len());
    for i in 0..repeated.len() {
        encoding_requirements.push(read_requirement(&*as_message(repeated.get(i))?)?);
    }
    Ok(Profile {
        description,
        encoding_requirements,
    })
}

fn read_requirement(message: &dyn MessageDyn) -> Result<EncodingRequirement, SpecError> {
    let descriptor = message.descriptor_dyn();
    let description =
        as_string(field_of(&descriptor, "description")?.get_singular_field_or_default(message))?;

    let locations = field_of(&descriptor, "bit_locations")?.get_repeated(message);
    let mut bit_locations = Vec::with_capacity(locations.len());
    for i in 0..locations.len() {
        let location = locations
            .get(i)
            .to_u32()
            .ok_or_else(|| SpecError::Body("bit_locations holds a non-uint32".into()))?;
        bit_locations.push(location as usize);
    }

    let values = field_of(&descriptor, "required_values")?.get_repeated(message);
    let mut required_values = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        required_values.push(as_string(values.get(i))?);
    }

    Ok(EncodingRequirement {
        description,
        bit_locations,
        required_values,
    })
}

fn as_message(value: ReflectValueRef<'_>) -> Result<MessageRef<'_>, SpecError> {
    match value {
        ReflectValueRef::Message(message) => Ok(message),
        other => Err(SpecError::Body(format!("expected a message, got {:?}", other))),
    }
}

fn as_string(value: ReflectValueRef<'_>) -> Result<String, SpecError> {
    value
        .to_str()
        .map(str::to_string)
        .ok_or_else(|| SpecError::Body(format!("expected a string, got {:?}", value)))
}

// ============================================================================
// Printing
// ============================================================================

/// Render a spec in text format
pub fn print_spec_body(spec: &FeatureRequirementSpec) -> Result<String, SpecError> {
    let schema = Schema::new()?;
    let root_descriptor = schema.message("FeatureRequirementSpec")?;
    let entry_descriptor = schema.message("BrandSpecsEntry")?;
    let brand_descriptor = schema.message("BrandSpec")?;
    let profile_descriptor = schema.message("Profile")?;
    let requirement_descriptor = schema.message("EncodingRequirement")?;

    let mut root = root_descriptor.new_instance();
    let brand_specs = field_of(&root_descriptor, "brand_specs")?;
    for (brand, brand_spec) in &spec.brand_specs {
        let mut brand_message = brand_descriptor.new_instance();
        field_of(&brand_descriptor, "feature_version")?
            .set_singular_field(&mut *brand_message, ReflectValueBox::U32(brand_spec.feature_version));

        let profiles = field_of(&brand_descriptor, "profiles")?;
        for profile in &brand_spec.profiles {
            let mut profile_message = profile_descriptor.new_instance();
            field_of(&profile_descriptor, "description")?.set_singular_field(
                &mut *profile_message,
                ReflectValueBox::String(profile.description.clone()),
            );

            let requirements = field_of(&profile_descriptor, "encoding_requirements")?;
            for requirement in &profile.encoding_requirements {
                let requirement_message =
                    print_requirement(&requirement_descriptor, requirement)?;
                requirements
                    .mut_repeated(&mut *profile_message)
                    .push(ReflectValueBox::Message(requirement_message));
            }
            profiles
                .mut_repeated(&mut *brand_message)
                .push(ReflectValueBox::Message(profile_message));
        }

        let mut entry = entry_descriptor.new_instance();
        field_of(&entry_descriptor, "key")?
            .set_singular_field(&mut *entry, ReflectValueBox::String(brand.clone()));
        field_of(&entry_descriptor, "value")?
            .set_singular_field(&mut *entry, ReflectValueBox::Message(brand_message));
        brand_specs
            .mut_repeated(&mut *root)
            .push(ReflectValueBox::Message(entry));
    }

    Ok(text_format::print_to_string_pretty(&*root))
}

fn print_requirement(
    descriptor: &MessageDescriptor,
    requirement: &EncodingRequirement,
) -> Result<Box<dyn MessageDyn>, SpecError> {
    let mut message = descriptor.new_instance();
    field_of(descriptor, "description")?.set_singular_field(
        &mut *message,
        ReflectValueBox::String(requirement.description.clone()),
    );

    let locations = field_of(descriptor, "bit_locations")?;
    for &location in &requirement.bit_locations {
        let location = u32::try_from(location)
            .map_err(|_| SpecError::Body(format!("bit location {} does not fit uint32", location)))?;
        locations
            .mut_repeated(&mut *message)
            .push(ReflectValueBox::U32(location));
    }

    let values = field_of(descriptor, "required_values")?;
    for value in &requirement.required_values {
        values
            .mut_repeated(&mut *message)
            .push(ReflectValueBox::String(value.clone()));
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"
# Touchscreen SKUs
brand_specs {
  key: "ABC"
  value {
    feature_version: 2
    profiles {
      description: "touchscreen"
      encoding_requirements {
        description: "display bits"
        bit_locations: 0
        bit_locations: 3
        required_values: "01"
        required_values: "11"
      }
    }
  }
}
brand_specs {
  key: "XYZ"
  value {
    feature_version: 1
    profiles {
      encoding_requirements { bit_locations: 1 required_values: "1" }
    }
  }
}
"#;

    #[test]
    fn test_parse_textproto_fixture() {
        let spec = parse_spec_body(BODY).unwrap();
        assert_eq!(spec.brand_specs.len(), 2);

        let abc = &spec.brand_specs["ABC"];
        assert_eq!(abc.feature_version, 2);
        assert_eq!(abc.profiles[0].description, "touchscreen");
        let requirement = &abc.profiles[0].encoding_requirements[0];
        assert_eq!(requirement.bit_locations, vec![0, 3]);
        assert_eq!(requirement.required_values, vec!["01", "11"]);

        let xyz = &spec.brand_specs["XYZ"];
        assert_eq!(xyz.profiles[0].description, "");
        assert_eq!(xyz.profiles[0].encoding_requirements[0].bit_locations, vec![1]);
    }

    #[test]
    fn test_printed_body_parses_back() {
        let spec = parse_spec_body(BODY).unwrap();
        let printed = print_spec_body(&spec).unwrap();
        assert!(printed.contains("feature_version: 2"));
        assert_eq!(parse_spec_body(&printed).unwrap(), spec);
    }

    #[test]
    fn test_empty_body_is_an_empty_spec() {
        assert_eq!(parse_spec_body("").unwrap(), FeatureRequirementSpec::default());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        assert!(matches!(
            parse_spec_body("brand_spec { key: \"ABC\" }"),
            Err(SpecError::Body(_))
        ));
    }

    #[test]
    fn test_duplicate_brand_is_rejected() {
        let body = "brand_specs { key: \"ABC\" } brand_specs { key: \"ABC\" }";
        assert!(matches!(parse_spec_body(body), Err(SpecError::Body(_))));
    }

    #[test]
    fn test_json_body_is_rejected() {
        assert!(matches!(
            parse_spec_body("{\"brand_specs\": {}}"),
            Err(SpecError::Body(_))
        ));
    }
}
