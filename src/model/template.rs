use std::ops::Range;

use crate::err::ModelError;

use super::{InType, MapId, OutType};

/// How many elements (or bytes) a property holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cardinality {
    Fixed(u16),
    /// Taken at runtime from the named sibling data property.
    Property(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataProperty {
    pub name: String,
    pub in_type: InType,
    pub out_type: OutType,
    pub map: Option<MapId>,
    pub count: Option<Cardinality>,
    pub length: Option<Cardinality>,
}

impl DataProperty {
    pub fn new(name: impl Into<String>, in_type: InType) -> Self {
        DataProperty {
            name: name.into(),
            in_type,
            out_type: in_type.default_out_type(),
            map: None,
            count: None,
            length: None,
        }
    }

    pub fn with_out_type(mut self, out_type: OutType) -> Self {
        self.out_type = out_type;
        self
    }

    pub fn with_map(mut self, map: MapId) -> Self {
        self.map = Some(map);
        self
    }

    pub fn with_count(mut self, count: Cardinality) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_length(mut self, length: Cardinality) -> Self {
        self.length = Some(length);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructProperty {
    pub name: String,
    pub members: Vec<Property>,
    pub count: Option<Cardinality>,
}

impl StructProperty {
    pub fn new(name: impl Into<String>, members: Vec<Property>) -> Self {
        StructProperty {
            name: name.into(),
            members,
            count: None,
        }
    }

    pub fn with_count(mut self, count: Cardinality) -> Self {
        self.count = Some(count);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    Data(DataProperty),
    Struct(StructProperty),
}

impl Property {
    pub fn name(&self) -> &str {
        match self {
            Property::Data(d) => &d.name,
            Property::Struct(s) => &s.name,
        }
    }

    pub fn count(&self) -> Option<&Cardinality> {
        match self {
            Property::Data(d) => d.count.as_ref(),
            Property::Struct(s) => s.count.as_ref(),
        }
    }

    pub fn length(&self) -> Option<&Cardinality> {
        match self {
            Property::Data(d) => d.length.as_ref(),
            Property::Struct(_) => None,
        }
    }

    /// The `(in, out)` type-tag pair, `0xFF` for structs.
    pub fn type_tags(&self) -> (u8, u8) {
        match self {
            Property::Data(d) => (d.in_type.code(), d.out_type.code()),
            Property::Struct(_) => (0xFF, 0xFF),
        }
    }
}

impl From<DataProperty> for Property {
    fn from(p: DataProperty) -> Self {
        Property::Data(p)
    }
}

impl From<StructProperty> for Property {
    fn from(p: StructProperty) -> Self {
        Property::Struct(p)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub properties: Vec<Property>,
}

/// One property in flattened (on-disk) order.
#[derive(Debug, Clone)]
pub struct FlatProperty<'a> {
    pub property: &'a Property,
    /// Flattened indices of this property and its siblings.
    pub scope: Range<usize>,
    /// Flattened indices of a struct's members; empty for data properties.
    pub members: Range<usize>,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Template {
            name: name.into(),
            properties: vec![],
        }
    }

    pub fn with_property(mut self, property: impl Into<Property>) -> Self {
        self.properties.push(property.into());
        self
    }

    /// Top-level properties first, then each struct's members as one contiguous range, in
    /// breadth-first order.
    pub fn flatten(&self) -> Vec<FlatProperty<'_>> {
        let top = 0..self.properties.len();
        let mut flat: Vec<FlatProperty<'_>> = self
            .properties
            .iter()
            .map(|property| FlatProperty {
                property,
                scope: top.clone(),
                members: 0..0,
            })
            .collect();

        let mut cursor = 0;
        while cursor < flat.len() {
            if let Property::Struct(s) = flat[cursor].property {
                let start = flat.len();
                let members = start..start + s.members.len();
                flat.extend(s.members.iter().map(|property| FlatProperty {
                    property,
                    scope: members.clone(),
                    members: 0..0,
                }));
                flat[cursor].members = members;
            }
            cursor += 1;
        }

        flat
    }

    /// Flattened index of the data property called `name` within `scope`.
    pub fn resolve_sibling(flat: &[FlatProperty<'_>], scope: &Range<usize>, name: &str) -> Option<usize> {
        scope
            .clone()
            .find(|&i| matches!(flat[i].property, Property::Data(d) if d.name == name))
    }

    /// Every count/length reference must name a data property of the same scope.
    pub(crate) fn validate(&self) -> Result<(), ModelError> {
        let flat = self.flatten();
        for entry in &flat {
            let references = [("count", entry.property.count()), ("length", entry.property.length())];
            for (what, cardinality) in references {
                let Some(Cardinality::Property(target)) = cardinality else {
                    continue;
                };

                if Self::resolve_sibling(&flat, &entry.scope, target).is_some() {
                    continue;
                }

                let names_struct = entry
                    .scope
                    .clone()
                    .any(|i| flat[i].property.name() == target);

                return Err(if names_struct {
                    ModelError::StructPropertyReference {
                        template: self.name.clone(),
                        property: entry.property.name().to_string(),
                        what,
                    }
                } else {
                    ModelError::UnknownPropertyReference {
                        template: self.name.clone(),
                        property: entry.property.name().to_string(),
                        target: target.clone(),
                    }
                });
            }
        }
        Ok(())
    }

    /// Every map referenced by a data property, in flattened order.
    pub(crate) fn referenced_maps(&self) -> impl Iterator<Item = MapId> + '_ {
        fn walk(properties: &[Property], out: &mut Vec<MapId>) {
            for p in properties {
                match p {
                    Property::Data(d) => out.extend(d.map),
                    Property::Struct(s) => walk(&s.members, out),
                }
            }
        }

        let mut maps = vec![];
        walk(&self.properties, &mut maps);
        maps.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nested() -> Template {
        Template::new("T")
            .with_property(DataProperty::new("a", InType::UInt32))
            .with_property(StructProperty::new(
                "s",
                vec![
                    DataProperty::new("x", InType::UInt16).into(),
                    StructProperty::new("inner", vec![DataProperty::new("deep", InType::Int8).into()])
                        .into(),
                ],
            ))
            .with_property(StructProperty::new(
                "t",
                vec![DataProperty::new("y", InType::Boolean).into()],
            ))
    }

    #[test]
    fn test_flatten_is_breadth_first() {
        let template = nested();
        let flat = template.flatten();
        let names: Vec<&str> = flat.iter().map(|f| f.property.name()).collect();
        assert_eq!(names, vec!["a", "s", "t", "x", "inner", "y", "deep"]);

        assert_eq!(flat[1].members, 3..5);
        assert_eq!(flat[2].members, 5..6);
        assert_eq!(flat[4].members, 6..7);
        assert_eq!(flat[3].scope, 3..5);
    }

    #[test]
    fn test_validate_rejects_unknown_and_struct_references() {
        let ok = Template::new("T")
            .with_property(
                DataProperty::new("data", InType::Binary)
                    .with_length(Cardinality::Property("len".to_string())),
            )
            .with_property(DataProperty::new("len", InType::UInt16));
        assert_eq!(ok.validate(), Ok(()));

        let unknown = Template::new("T").with_property(
            DataProperty::new("data", InType::Binary)
                .with_length(Cardinality::Property("missing".to_string())),
        );
        assert!(matches!(
            unknown.validate(),
            Err(ModelError::UnknownPropertyReference { .. })
        ));

        let to_struct = Template::new("T")
            .with_property(StructProperty::new("s", vec![]))
            .with_property(
                DataProperty::new("items", InType::UInt8)
                    .with_count(Cardinality::Property("s".to_string())),
            );
        assert!(matches!(
            to_struct.validate(),
            Err(ModelError::StructPropertyReference { what: "count", .. })
        ));
    }
}
