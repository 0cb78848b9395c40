//! InfluxDB line protocol.
//!
//! Every point attribute has a fixed role on the wire, listed once in
//! [`ATTRIBUTES`]: part of the measurement key, a tag, the value field or the
//! timestamp. Tags are emitted in table order, which is alphabetical.

use std::fmt;

use crate::point::Point;

/// Separator between the elements of an array valued tag.
pub const ARRAY_SEPARATOR: &str = "\\,";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Role {
    Key,
    Tag(&'static str),
    Value,
    Time,
}

enum Attr<'a> {
    Text(&'a str),
    List(&'a [String]),
    Capacity(i32),
    Integer(i64),
}

struct Attribute {
    role: Role,
    read: for<'a> fn(&'a Point) -> Attr<'a>,
}

const ATTRIBUTES: &[Attribute] = &[
    Attribute {
        role: Role::Key,
        read: |p| Attr::Text(&p.group),
    },
    Attribute {
        role: Role::Key,
        read: |p| Attr::Text(&p.counter),
    },
    Attribute {
        role: Role::Key,
        read: |p| Attr::Text(&p.rollup),
    },
    Attribute {
        role: Role::Tag("cluster"),
        read: |p| Attr::Text(&p.cluster),
    },
    Attribute {
        role: Role::Tag("datastore"),
        read: |p| Attr::List(&p.datastore),
    },
    Attribute {
        role: Role::Tag("folder"),
        read: |p| Attr::Text(&p.folder),
    },
    Attribute {
        role: Role::Tag("host"),
        read: |p| Attr::Text(&p.esxi),
    },
    Attribute {
        role: Role::Tag("instance"),
        read: |p| Attr::Text(&p.instance),
    },
    Attribute {
        role: Role::Tag("memorysizemb"),
        read: |p| Attr::Capacity(p.memory_size_mb),
    },
    Attribute {
        role: Role::Tag("name"),
        read: |p| Attr::Text(&p.object_name),
    },
    Attribute {
        role: Role::Tag("network"),
        read: |p| Attr::List(&p.network),
    },
    Attribute {
        role: Role::Tag("numcpu"),
        read: |p| Attr::Capacity(p.num_cpu),
    },
    Attribute {
        role: Role::Tag("resourcepool"),
        read: |p| Attr::Text(&p.resource_pool),
    },
    Attribute {
        role: Role::Tag("type"),
        read: |p| Attr::Text(&p.object_type),
    },
    Attribute {
        role: Role::Tag("vcenter"),
        read: |p| Attr::Text(&p.vcenter),
    },
    Attribute {
        role: Role::Tag("vitags"),
        read: |p| Attr::List(&p.vitags),
    },
    Attribute {
        role: Role::Value,
        read: |p| Attr::Integer(p.value),
    },
    Attribute {
        role: Role::Time,
        read: |p| Attr::Integer(p.timestamp),
    },
];

fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn escape_measurement(value: &str) -> String {
    escape(value, &[',', ' '])
}

/// Escapes tag keys, tag values and field keys.
pub fn escape_tag(value: &str) -> String {
    escape(value, &[',', '=', ' '])
}

/// Renders an array valued tag, or only its first element when arrays are
/// disabled. Elements are escaped before joining.
pub fn join_tag(values: &[String], no_array: bool) -> String {
    if no_array {
        return values.first().map(|v| escape_tag(v)).unwrap_or_default();
    }

    values
        .iter()
        .map(|v| escape_tag(v))
        .collect::<Vec<_>>()
        .join(ARRAY_SEPARATOR)
}

/// One encoded measurement. Empty tags and fields are dropped when added, so
/// rendering never leaves a dangling separator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Line {
    key: String,
    tags: Vec<(String, String)>,
    fields: Vec<(String, String)>,
    timestamp: i64,
}

impl Line {
    pub fn new(key: &str, timestamp: i64) -> Self {
        Self {
            key: escape_measurement(key),
            timestamp,
            ..Default::default()
        }
    }

    /// Adds an already escaped tag value.
    pub fn tag(mut self, name: &str, value: String) -> Self {
        if !value.is_empty() {
            self.tags.push((escape_tag(name), value));
        }
        self
    }

    /// Adds an integer field.
    pub fn field(mut self, name: &str, value: i64) -> Self {
        if !name.is_empty() {
            self.fields.push((escape_tag(name), format!("{value}i")));
        }
        self
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)?;

        for (name, value) in &self.tags {
            write!(f, ",{name}={value}")?;
        }

        for (i, (name, value)) in self.fields.iter().enumerate() {
            let separator = if i == 0 { ' ' } else { ',' };
            write!(f, "{separator}{name}={value}")?;
        }

        write!(f, " {}", self.timestamp)
    }
}

/// Encodes points by walking the attribute table.
#[derive(Clone, Debug)]
pub struct Encoder {
    value_field: String,
    no_array: bool,
}

impl Encoder {
    pub fn new(value_field: &str, no_array: bool) -> Self {
        Self {
            value_field: value_field.to_string(),
            no_array,
        }
    }

    pub fn line(&self, point: &Point) -> Line {
        let mut key = Vec::new();
        let mut tags = Vec::new();
        let mut value = None;
        let mut timestamp = 0;

        for attribute in ATTRIBUTES {
            match (attribute.role, (attribute.read)(point)) {
                (Role::Key, Attr::Text(part)) => key.push(part),
                (Role::Tag(name), Attr::Text(text)) => tags.push((name, escape_tag(text))),
                (Role::Tag(name), Attr::List(list)) => {
                    tags.push((name, join_tag(list, self.no_array)))
                }
                (Role::Tag(name), Attr::Capacity(count)) if count != 0 => {
                    tags.push((name, count.to_string()))
                }
                (Role::Value, Attr::Integer(v)) => value = Some(v),
                (Role::Time, Attr::Integer(t)) => timestamp = t,
                _ => {}
            }
        }

        let line = tags
            .into_iter()
            .fold(Line::new(&key.join("_"), timestamp), |line, (name, value)| {
                line.tag(name, value)
            });

        match value {
            Some(v) => line.field(&self.value_field, v),
            None => line,
        }
    }

    pub fn encode(&self, point: &Point) -> String {
        self.line(point).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> Point {
        Point {
            vcenter: "vc1".into(),
            object_type: "virtualmachine".into(),
            object_name: "web 01".into(),
            group: "cpu".into(),
            counter: "usage".into(),
            rollup: "average".into(),
            value: 20,
            datastore: vec!["DS1".into(), "DS,2".into()],
            esxi: "h1".into(),
            cluster: "C1".into(),
            vitags: vec!["gold".into()],
            num_cpu: 2,
            memory_size_mb: 4096,
            timestamp: 999,
            ..Default::default()
        }
    }

    #[test]
    fn encodes_full_point() {
        let encoder = Encoder::new("Value", false);

        assert_eq!(
            encoder.encode(&point()),
            "cpu_usage_average,cluster=C1,datastore=DS1\\,DS\\,2,host=h1,\
             memorysizemb=4096,name=web\\ 01,numcpu=2,type=virtualmachine,\
             vcenter=vc1,vitags=gold Value=20i 999"
        );
    }

    #[test]
    fn no_array_keeps_first_element() {
        let encoder = Encoder::new("value", true);
        let line = encoder.encode(&point());

        assert!(line.contains(",datastore=DS1,host="));
        assert!(line.ends_with(" value=20i 999"));
    }

    #[test]
    fn empty_tags_and_capacity_are_omitted() {
        let point = Point {
            group: "cpu".into(),
            counter: "usage".into(),
            rollup: "average".into(),
            value: -1,
            timestamp: 42,
            ..Default::default()
        };

        assert_eq!(
            Encoder::new("Value", false).encode(&point),
            "cpu_usage_average Value=-1i 42"
        );
    }

    #[test]
    fn empty_tag_and_field_sets_leave_no_separator() {
        let line = Line::new("cpu_usage_average", 42)
            .tag("host", String::new())
            .field("", 7);

        assert_eq!(line.to_string(), "cpu_usage_average 42");
    }

    #[test]
    fn multiple_fields_are_comma_separated() {
        let line = Line::new("m", 1)
            .tag("a", "b".into())
            .field("x", 1)
            .field("y", 2);

        assert_eq!(line.to_string(), "m,a=b x=1i,y=2i 1");
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_measurement("a b,c=d"), "a\\ b\\,c=d");
        assert_eq!(escape_tag("a b,c=d"), "a\\ b\\,c\\=d");
        assert_eq!(join_tag(&[], false), "");
        assert_eq!(join_tag(&[], true), "");
        assert_eq!(
            join_tag(&["a".into(), "b c".into()], false),
            "a\\,b\\ c"
        );
    }
}
