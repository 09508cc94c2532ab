/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Minimal XML-RPC codec for the Koji hub.

use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;

use super::error::{ScrapeError, ScrapeResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    DateTime(String),
    Base64(String),
    Array(Vec<Value>),
    Struct(Vec<(String, Value)>),
}

impl Value {
    /// Keyword arguments in Koji's `__starstar` convention.
    pub fn keywords(members: Vec<(&str, Value)>) -> Self {
        let members = members
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Value::Struct(vec![("__starstar".to_string(), Value::Struct(members))])
    }

    pub fn structure(members: Vec<(&str, Value)>) -> Self {
        Value::Struct(
            members
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Struct(members) => members.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Double(d) => Some(*d as i64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::DateTime(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn into_array(self) -> Option<Vec<Value>> {
        match self {
            Value::Array(values) => Some(values),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

pub fn encode_call(method: &str, params: &[Value]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<methodCall>");
    out.push_str("<methodName>");
    out.push_str(&escape(method));
    out.push_str("</methodName><params>");
    for param in params {
        out.push_str("<param>");
        write_value(&mut out, param);
        out.push_str("</param>");
    }
    out.push_str("</params></methodCall>");
    out
}

fn write_value(out: &mut String, value: &Value) {
    out.push_str("<value>");
    match value {
        Value::Nil => out.push_str("<nil/>"),
        Value::Bool(b) => {
            out.push_str(if *b { "<boolean>1</boolean>" } else { "<boolean>0</boolean>" })
        }
        Value::Int(i) => {
            let tag = if i32::try_from(*i).is_ok() { "int" } else { "i8" };
            out.push_str(&format!("<{tag}>{i}</{tag}>"));
        }
        Value::Double(d) => out.push_str(&format!("<double>{}</double>", d)),
        Value::String(s) => {
            out.push_str("<string>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</string>");
        }
        Value::DateTime(s) => {
            out.push_str("<dateTime.iso8601>");
            out.push_str(&escape(s.as_str()));
            out.push_str("</dateTime.iso8601>");
        }
        Value::Base64(s) => {
            out.push_str("<base64>");
            out.push_str(s);
            out.push_str("</base64>");
        }
        Value::Array(values) => {
            out.push_str("<array><data>");
            for v in values {
                write_value(out, v);
            }
            out.push_str("</data></array>");
        }
        Value::Struct(members) => {
            out.push_str("<struct>");
            for (name, v) in members {
                out.push_str("<member><name>");
                out.push_str(&escape(name.as_str()));
                out.push_str("</name>");
                write_value(out, v);
                out.push_str("</member>");
            }
            out.push_str("</struct>");
        }
    }
    out.push_str("</value>");
}

#[derive(Debug, Default)]
struct Node {
    name: String,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }
}

fn parse_tree(xml: &str) -> ScrapeResult<Node> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Node> = vec![Node::default()];
    let invalid = |e: String| ScrapeError::Mapping(format!("invalid XML-RPC response: {}", e));

    loop {
        match reader.read_event().map_err(|e| invalid(e.to_string()))? {
            Event::Start(start) => stack.push(Node {
                name: local_name(start.name().as_ref()),
                ..Default::default()
            }),
            Event::Empty(empty) => {
                let node = Node {
                    name: local_name(empty.name().as_ref()),
                    ..Default::default()
                };
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| invalid(e.to_string()))?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(_) => {
                let node = stack.pop().ok_or_else(|| invalid("unbalanced tags".into()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Err(invalid("unbalanced tags".into())),
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(root), true) => Ok(root),
        _ => Err(invalid("unexpected end of document".into())),
    }
}

fn local_name(name: &[u8]) -> String {
    let name = String::from_utf8_lossy(name);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.to_string(),
    }
}

fn decode_value(node: &Node) -> ScrapeResult<Value> {
    let Some(typed) = node.children.first() else {
        return Ok(Value::String(node.text.clone()));
    };

    let text = typed.text.trim();
    let number = |kind: &str| ScrapeError::Mapping(format!("invalid {} `{}`", kind, text));

    Ok(match typed.name.as_str() {
        "i4" | "int" | "i8" => Value::Int(text.parse().map_err(|_| number("integer"))?),
        "boolean" => Value::Bool(text == "1" || text.eq_ignore_ascii_case("true")),
        "double" => Value::Double(text.parse().map_err(|_| number("double"))?),
        "string" => Value::String(typed.text.clone()),
        "dateTime.iso8601" => Value::DateTime(text.to_string()),
        "base64" => Value::Base64(text.to_string()),
        "nil" => Value::Nil,
        "array" => Value::Array(
            typed
                .child("data")
                .map(|data| data.children.iter().map(decode_value).collect())
                .transpose()?
                .unwrap_or_default(),
        ),
        "struct" => Value::Struct(
            typed
                .children
                .iter()
                .filter(|m| m.name == "member")
                .filter_map(|m| Some((m.child("name")?, m.child("value")?)))
                .map(|(name, value)| Ok((name.text.trim().to_string(), decode_value(value)?)))
                .collect::<ScrapeResult<_>>()?,
        ),
        other => return Err(ScrapeError::Mapping(format!("unknown XML-RPC type `{}`", other))),
    })
}

/// First return value of a `methodResponse`, or the fault as an error.
pub fn decode_response(xml: &str) -> ScrapeResult<Value> {
    let root = parse_tree(xml)?;
    let response = root
        .child("methodResponse")
        .ok_or_else(|| ScrapeError::Mapping("missing methodResponse".to_string()))?;

    if let Some(fault) = response.child("fault").and_then(|f| f.child("value")) {
        let fault = decode_value(fault)?;
        let code = fault.get("faultCode").and_then(Value::as_i64).unwrap_or_default();
        let message = fault
            .get("faultString")
            .and_then(Value::as_str)
            .unwrap_or("unknown fault");
        return Err(ScrapeError::Mapping(format!("XML-RPC fault {}: {}", code, message)));
    }

    response
        .child("params")
        .and_then(|p| p.child("param"))
        .and_then(|p| p.child("value"))
        .map(decode_value)
        .unwrap_or(Ok(Value::Nil))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_keywords() {
        let body = encode_call(
            "listBuilds",
            &[Value::keywords(vec![
                ("packageID", Value::Int(42)),
                ("queryOpts", Value::structure(vec![("order", "-build_id".into())])),
            ])],
        );

        assert!(body.contains("<methodName>listBuilds</methodName>"));
        assert!(body.contains("<name>__starstar</name>"));
        assert!(body.contains("<name>packageID</name><value><int>42</int></value>"));
        assert!(body.contains("<string>-build_id</string>"));
    }

    #[test]
    fn test_encode_escapes_strings() {
        let body = encode_call("getPackage", &["a<b&c".into()]);
        assert!(body.contains("<string>a&lt;b&amp;c</string>"));
    }

    #[test]
    fn test_decode_struct_array() {
        let xml = r#"<?xml version='1.0'?>
<methodResponse>
<params>
<param>
<value><array><data>
<value><struct>
<member><name>build_id</name><value><int>2400</int></value></member>
<member><name>nvr</name><value><string>gcc-14.1.1-1.fc41</string></value></member>
<member><name>source</name><value><nil/></value></member>
<member><name>plain</name><value>untyped</value></member>
</struct></value>
</data></array></value>
</param>
</params>
</methodResponse>"#;

        let builds = decode_response(xml).unwrap().into_array().unwrap();
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].get("build_id").and_then(Value::as_i64), Some(2400));
        assert_eq!(builds[0].get("nvr").and_then(Value::as_str), Some("gcc-14.1.1-1.fc41"));
        assert!(builds[0].get("source").unwrap().is_nil());
        assert_eq!(builds[0].get("plain").and_then(Value::as_str), Some("untyped"));
    }

    #[test]
    fn test_decode_nil_result() {
        let xml = "<methodResponse><params><param><value><nil/></value></param></params></methodResponse>";
        assert!(decode_response(xml).unwrap().is_nil());
    }

    #[test]
    fn test_decode_fault() {
        let xml = r#"<methodResponse><fault><value><struct>
<member><name>faultCode</name><value><int>1000</int></value></member>
<member><name>faultString</name><value><string>no such package</string></value></member>
</struct></value></fault></methodResponse>"#;

        let err = decode_response(xml).unwrap_err();
        assert!(err.to_string().contains("no such package"));
    }
}
