//! Field descriptions given on the command line.

use kdpoints_format::{FieldInfo, FieldInfos, PointsResult};
use std::str::FromStr;
use thiserror::Error;

/// Error parsing a `--field` argument.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldSpecError {
    /// Wrong number of parts or an empty name.
    #[error("expected name:number:dims[:index_dims]:bytes, got {0:?}")]
    Shape(String),

    /// A numeric part did not parse.
    #[error("invalid {part} {value:?} in field spec")]
    Number {
        /// Which part was invalid.
        part: &'static str,
        /// The offending text.
        value: String,
    },
}

/// A field as described by `name:number:dims[:index_dims]:bytes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec(pub FieldInfo);

impl FromStr for FieldSpec {
    type Err = FieldSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let (name, number, dims, index_dims, bytes) = match parts.as_slice() {
            [name, number, dims, bytes] => (*name, *number, *dims, None, *bytes),
            [name, number, dims, index_dims, bytes] => {
                (*name, *number, *dims, Some(*index_dims), *bytes)
            }
            _ => return Err(FieldSpecError::Shape(s.to_string())),
        };
        if name.is_empty() {
            return Err(FieldSpecError::Shape(s.to_string()));
        }

        let number = parse_part::<u32>("number", number)?;
        let dims = parse_part::<usize>("dims", dims)?;
        let bytes = parse_part::<usize>("bytes", bytes)?;
        let mut info = FieldInfo::new(name, number, dims, bytes);
        if let Some(index_dims) = index_dims {
            info = info.index_dimensions(parse_part("index_dims", index_dims)?);
        }
        Ok(Self(info))
    }
}

fn parse_part<T: FromStr>(part: &'static str, value: &str) -> Result<T, FieldSpecError> {
    value.parse().map_err(|_| FieldSpecError::Number {
        part,
        value: value.to_string(),
    })
}

/// Collects parsed specs into the field table a reader is opened with.
pub fn field_infos(specs: &[FieldSpec]) -> PointsResult<FieldInfos> {
    FieldInfos::from_fields(specs.iter().map(|spec| spec.0.clone()))
}
