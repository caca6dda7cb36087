//! Facade over the distinguished `name` custom section.
//!
//! The section carries an optional module name and maps from function and
//! local indices to names. It has no effect on the module semantics and is
//! stored raw in the module's custom sections; this facade decodes and
//! encodes the payload.
//!
//! See <https://webassembly.github.io/spec/core/appendix/custom.html#name-section>

use crate::leb128;
use crate::model::{Custom, ModelError, Name, NAME_SECTION};
use std::collections::BTreeMap;

/// Subsection id for the module name.
const MODULE_SUBSECTION: u8 = 0;

/// Subsection id for the function name map.
const FUNCTION_SUBSECTION: u8 = 1;

/// Subsection id for the local name maps.
const LOCAL_SUBSECTION: u8 = 2;

/// The decoded content of a `name` custom section.
///
/// # Examples
/// ```rust
/// use wasmkit::NameSection;
///
/// let mut names = NameSection::empty();
/// names.set_module_name(Some("m".into()));
/// names.name_function(0, "add".into());
///
/// let custom = names.to_custom();
/// let decoded = NameSection::parse(&custom).unwrap();
///
/// assert_eq!(decoded.module_name().map(|n| n.as_str()), Some("m"));
/// assert_eq!(decoded.function_name(0).map(|n| n.as_str()), Some("add"));
/// assert_eq!(decoded.function_name(1), None);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NameSection {
    module_name: Option<Name>,
    function_names: BTreeMap<u32, Name>,
    local_names: BTreeMap<u32, BTreeMap<u32, Name>>,
}

impl NameSection {
    /// Creates an empty name section.
    pub fn empty() -> Self {
        NameSection::default()
    }

    /// The name of the module, if present.
    pub fn module_name(&self) -> Option<&Name> {
        self.module_name.as_ref()
    }

    /// Sets the name of the module.
    pub fn set_module_name(&mut self, name: Option<Name>) {
        self.module_name = name;
    }

    /// The name of the function with the given index, if present.
    pub fn function_name(&self, function: u32) -> Option<&Name> {
        self.function_names.get(&function)
    }

    /// Associates a name with a function index.
    pub fn name_function(&mut self, function: u32, name: Name) {
        self.function_names.insert(function, name);
    }

    /// The name of a local within the function with the given index, if present.
    pub fn local_name(&self, function: u32, local: u32) -> Option<&Name> {
        self.local_names.get(&function)?.get(&local)
    }

    /// Associates a name with a local index within a function.
    pub fn name_local(&mut self, function: u32, local: u32, name: Name) {
        self.local_names
            .entry(function)
            .or_default()
            .insert(local, name);
    }

    /// True when the section carries no names at all.
    pub fn is_empty(&self) -> bool {
        self.module_name.is_none()
            && self.function_names.is_empty()
            && self.local_names.is_empty()
    }

    /// Decodes the payload of a `name` custom section.
    pub fn parse(custom: &Custom) -> Result<Self, ModelError> {
        let mut names = NameSection::empty();
        let mut input = custom.bytes();

        while !input.is_empty() {
            let id = input[0];
            let (rest, size) = decode_u32(&input[1..])?;
            let size = size as usize;

            if rest.len() < size {
                return Err(ModelError::MalformedNames);
            }

            let (payload, remaining) = rest.split_at(size);

            match id {
                MODULE_SUBSECTION => {
                    let (tail, name) = decode_name(payload)?;
                    expect_empty(tail)?;
                    names.module_name = Some(name);
                }
                FUNCTION_SUBSECTION => {
                    let (tail, map) = decode_name_map(payload)?;
                    expect_empty(tail)?;
                    names.function_names = map;
                }
                LOCAL_SUBSECTION => {
                    let (mut tail, count) = decode_u32(payload)?;

                    for _ in 0..count {
                        let (rest, function) = decode_u32(tail)?;
                        let (rest, map) = decode_name_map(rest)?;

                        names.local_names.insert(function, map);
                        tail = rest;
                    }

                    expect_empty(tail)?;
                }
                // Unknown subsections are ignored, per the specification.
                _ => {}
            }

            input = remaining;
        }

        Ok(names)
    }

    /// Encodes this section into a `name` custom section.
    pub fn to_custom(&self) -> Custom {
        let mut bytes = Vec::new();

        if let Some(name) = &self.module_name {
            let mut payload = Vec::new();
            encode_name(name, &mut payload);
            encode_subsection(MODULE_SUBSECTION, &payload, &mut bytes);
        }

        if !self.function_names.is_empty() {
            let mut payload = Vec::new();
            encode_name_map(&self.function_names, &mut payload);
            encode_subsection(FUNCTION_SUBSECTION, &payload, &mut bytes);
        }

        if !self.local_names.is_empty() {
            let mut payload = Vec::new();
            encode_u32(self.local_names.len() as u32, &mut payload);

            for (function, map) in &self.local_names {
                encode_u32(*function, &mut payload);
                encode_name_map(map, &mut payload);
            }

            encode_subsection(LOCAL_SUBSECTION, &payload, &mut bytes);
        }

        Custom::new(NAME_SECTION.into(), bytes)
    }
}

fn expect_empty(input: &[u8]) -> Result<(), ModelError> {
    if input.is_empty() {
        Ok(())
    } else {
        Err(ModelError::MalformedNames)
    }
}

fn decode_u32(input: &[u8]) -> Result<(&[u8], u32), ModelError> {
    leb128::decode_unsigned(input, 32)
        .map(|(rest, value)| (rest, value as u32))
        .map_err(|_| ModelError::MalformedNames)
}

fn decode_name(input: &[u8]) -> Result<(&[u8], Name), ModelError> {
    let (input, length) = decode_u32(input)?;
    let length = length as usize;

    if input.len() < length {
        return Err(ModelError::MalformedNames);
    }

    let (bytes, rest) = input.split_at(length);
    let text = std::str::from_utf8(bytes).map_err(|_| ModelError::MalformedNames)?;

    Ok((rest, Name::from(text)))
}

fn decode_name_map(input: &[u8]) -> Result<(&[u8], BTreeMap<u32, Name>), ModelError> {
    let (mut input, count) = decode_u32(input)?;
    let mut map = BTreeMap::new();

    for _ in 0..count {
        let (rest, index) = decode_u32(input)?;
        let (rest, name) = decode_name(rest)?;

        map.insert(index, name);
        input = rest;
    }

    Ok((input, map))
}

fn encode_u32(value: u32, output: &mut Vec<u8>) {
    leb128::encode_unsigned(value as u64, output).expect("writes to a vector cannot fail");
}

fn encode_name(name: &Name, output: &mut Vec<u8>) {
    encode_u32(name.len() as u32, output);
    output.extend_from_slice(name.as_bytes());
}

fn encode_name_map(map: &BTreeMap<u32, Name>, output: &mut Vec<u8>) {
    encode_u32(map.len() as u32, output);

    for (index, name) in map {
        encode_u32(*index, output);
        encode_name(name, output);
    }
}

fn encode_subsection(id: u8, payload: &[u8], output: &mut Vec<u8>) {
    output.push(id);
    encode_u32(payload.len() as u32, output);
    output.extend_from_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_section_has_no_payload() {
        let custom = NameSection::empty().to_custom();

        assert_eq!(custom.name().as_str(), NAME_SECTION);
        assert!(custom.bytes().is_empty());
    }

    #[test]
    fn module_name_round_trip() {
        let mut names = NameSection::empty();
        names.set_module_name(Some("m".into()));

        let decoded = NameSection::parse(&names.to_custom()).unwrap();

        assert_eq!(decoded, names);
        // Subsection 0, size 2, name length 1, 'm'.
        assert_eq!(names.to_custom().bytes(), &[0x00, 0x02, 0x01, b'm']);
    }

    #[test]
    fn local_names_round_trip() {
        let mut names = NameSection::empty();
        names.name_function(2, "run".into());
        names.name_local(2, 0, "x".into());
        names.name_local(2, 1, "y".into());

        let decoded = NameSection::parse(&names.to_custom()).unwrap();

        assert_eq!(decoded, names);
        assert_eq!(decoded.local_name(2, 1).map(|n| n.as_str()), Some("y"));
    }

    #[test]
    fn unknown_subsections_are_ignored() {
        // Subsection 9 with a two-byte payload, then a module name.
        let custom = Custom::new(
            NAME_SECTION.into(),
            vec![0x09, 0x02, 0xAA, 0xBB, 0x00, 0x02, 0x01, b'm'],
        );

        let decoded = NameSection::parse(&custom).unwrap();

        assert_eq!(decoded.module_name().map(|n| n.as_str()), Some("m"));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let custom = Custom::new(NAME_SECTION.into(), vec![0x00, 0x05, 0x01]);

        assert!(NameSection::parse(&custom).is_err());
    }
}
