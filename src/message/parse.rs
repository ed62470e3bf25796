//! Building and validating messages from raw element trees
//!
//! Validation never suppresses a message: missing required attributes get
//! placeholders, bad values get fallbacks, and every finding is recorded as
//! a diagnostic on the emitted message.

use super::{
    DefineProperty, DeleteProperty, EnableBlob, GetProperties, Message, Payload, PingReply,
    PingRequest, ServerMessage, SetProperty, UpdateProperty, Value, ValuePayload,
};
use crate::diagnostic::Diagnostic;
use crate::format;
use crate::names::{PropertyName, ValueName};
use crate::property::{switch, BlobSending, Permission, PropertyKind, Status, SwitchRule};
use crate::timestamp::IndiTimestamp;
use crate::xml::RawElement;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::str::FromStr;

pub(super) fn build(raw: &RawElement) -> Option<Message> {
    let mut diags = Vec::new();
    let payload = match raw.name.as_str() {
        "getProperties" => get_properties(raw, &mut diags),
        "defTextVector" => define(raw, PropertyKind::Text, &mut diags),
        "defNumberVector" => define(raw, PropertyKind::Number, &mut diags),
        "defSwitchVector" => define(raw, PropertyKind::Switch, &mut diags),
        "defLightVector" => define(raw, PropertyKind::Light, &mut diags),
        "defBLOBVector" => define(raw, PropertyKind::Blob, &mut diags),
        "setTextVector" => update(raw, PropertyKind::Text, &mut diags),
        "setNumberVector" => update(raw, PropertyKind::Number, &mut diags),
        "setSwitchVector" => update(raw, PropertyKind::Switch, &mut diags),
        "setLightVector" => update(raw, PropertyKind::Light, &mut diags),
        "setBLOBVector" => update(raw, PropertyKind::Blob, &mut diags),
        "newTextVector" => set(raw, PropertyKind::Text, &mut diags),
        "newNumberVector" => set(raw, PropertyKind::Number, &mut diags),
        "newSwitchVector" => set(raw, PropertyKind::Switch, &mut diags),
        "newLightVector" => set(raw, PropertyKind::Light, &mut diags),
        "newBLOBVector" => set(raw, PropertyKind::Blob, &mut diags),
        "delProperty" => delete(raw, &mut diags),
        "enableBLOB" => enable_blob(raw, &mut diags),
        "message" => server_message(raw, &mut diags),
        "pingRequest" => Payload::PingRequest(PingRequest {
            uid: uid_of(raw, &mut diags),
        }),
        "pingReply" => Payload::PingReply(PingReply {
            uid: uid_of(raw, &mut diags),
        }),
        _ => return None,
    };
    Some(Message {
        payload,
        diagnostics: diags,
    })
}

/// Attribute reader that tracks consumption so leftovers can be reported
struct Attrs<'a> {
    raw: &'a RawElement,
    used: Vec<&'static str>,
}

impl<'a> Attrs<'a> {
    fn new(raw: &'a RawElement) -> Self {
        Self {
            raw,
            used: Vec::new(),
        }
    }

    fn take(&mut self, key: &'static str) -> Option<&'a str> {
        self.used.push(key);
        self.raw.attribute(key)
    }

    fn required(&mut self, key: &'static str, diags: &mut Vec<Diagnostic>) -> String {
        match self.take(key) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => {
                diags.push(Diagnostic::error(format!(
                    "<{}> is missing required attribute `{}`",
                    self.raw.name, key
                )));
                "UNKNOWN".to_string()
            }
        }
    }

    fn finish(self, diags: &mut Vec<Diagnostic>) {
        for key in self.raw.attributes.keys() {
            if !self.used.iter().any(|u| *u == key.as_str()) {
                diags.push(Diagnostic::warning(format!(
                    "unknown attribute `{}` on <{}> discarded",
                    key, self.raw.name
                )));
            }
        }
    }
}

fn warn_children(raw: &RawElement, diags: &mut Vec<Diagnostic>) {
    for child in &raw.children {
        diags.push(Diagnostic::warning(format!(
            "unexpected child <{}> in <{}> discarded",
            child.name, raw.name
        )));
    }
}

fn parse_state(attrs: &mut Attrs<'_>, diags: &mut Vec<Diagnostic>) -> Option<Status> {
    let raw = attrs.take("state")?;
    match Status::from_str_lenient(raw) {
        Some((state, false)) => Some(state),
        Some((state, true)) => {
            diags.push(Diagnostic::warning(format!(
                "state `{}` coerced to `{}`",
                raw, state
            )));
            Some(state)
        }
        None => {
            diags.push(Diagnostic::error(format!("invalid state `{}`", raw)));
            None
        }
    }
}

fn parse_perm(attrs: &mut Attrs<'_>, diags: &mut Vec<Diagnostic>) -> Option<Permission> {
    let raw = attrs.take("perm")?;
    match Permission::from_str(raw) {
        Ok(perm) => Some(perm),
        Err(_) => {
            diags.push(Diagnostic::error(format!("invalid perm `{}`", raw)));
            None
        }
    }
}

fn parse_rule(attrs: &mut Attrs<'_>, diags: &mut Vec<Diagnostic>) -> Option<SwitchRule> {
    let raw = attrs.take("rule")?;
    match SwitchRule::from_str(raw) {
        Ok(rule) => Some(rule),
        Err(_) => {
            diags.push(Diagnostic::error(format!("invalid rule `{}`", raw)));
            None
        }
    }
}

fn parse_timeout(attrs: &mut Attrs<'_>, diags: &mut Vec<Diagnostic>) -> Option<f64> {
    let raw = attrs.take("timeout")?;
    match raw.parse::<f64>() {
        Ok(timeout) => Some(timeout),
        Err(_) => {
            diags.push(Diagnostic::warning(format!("invalid timeout `{}`", raw)));
            None
        }
    }
}

fn parse_timestamp(attrs: &mut Attrs<'_>, diags: &mut Vec<Diagnostic>) -> Option<IndiTimestamp> {
    let raw = attrs.take("timestamp")?;
    match IndiTimestamp::from_str(raw) {
        Ok(ts) => Some(ts),
        Err(_) => {
            diags.push(Diagnostic::warning(format!("invalid timestamp `{}`", raw)));
            None
        }
    }
}

fn parse_f64_attr(
    attrs: &mut Attrs<'_>,
    key: &'static str,
    diags: &mut Vec<Diagnostic>,
) -> Option<f64> {
    let raw = attrs.take(key)?;
    match format::parse_number(raw) {
        Ok(v) => Some(v),
        Err(_) => {
            diags.push(Diagnostic::warning(format!("invalid {} `{}`", key, raw)));
            None
        }
    }
}

fn parse_u64_attr(
    attrs: &mut Attrs<'_>,
    key: &'static str,
    diags: &mut Vec<Diagnostic>,
) -> Option<u64> {
    let raw = attrs.take(key)?;
    match raw.parse::<u64>() {
        Ok(v) => Some(v),
        Err(_) => {
            diags.push(Diagnostic::warning(format!("invalid {} `{}`", key, raw)));
            None
        }
    }
}

fn check_value_name(property: &PropertyName, value: &ValueName, diags: &mut Vec<Diagnostic>) {
    match property.known_values() {
        Some(known) => {
            if !known.contains(value) {
                diags.push(Diagnostic::warning(format!(
                    "value `{}` is not defined for property `{}`",
                    value, property
                )));
            }
        }
        None => {
            if !value.is_known() {
                diags.push(Diagnostic::note(format!(
                    "unknown value `{}` on unknown property `{}`",
                    value, property
                )));
            }
        }
    }
}

fn get_properties(raw: &RawElement, diags: &mut Vec<Diagnostic>) -> Payload {
    let mut attrs = Attrs::new(raw);
    let version = attrs
        .take("version")
        .map(str::to_string)
        .unwrap_or_else(|| crate::PROTOCOL_VERSION.to_string());
    let device = attrs.take("device").map(str::to_string);
    let name = attrs.take("name").map(PropertyName::parse);
    attrs.finish(diags);
    warn_children(raw, diags);
    Payload::GetProperties(GetProperties {
        device,
        name,
        version,
    })
}

fn define(raw: &RawElement, kind: PropertyKind, diags: &mut Vec<Diagnostic>) -> Payload {
    let mut attrs = Attrs::new(raw);
    let device = attrs.required("device", diags);
    let name = PropertyName::parse(&attrs.required("name", diags));
    let label = attrs.take("label").map(str::to_string);
    let group = attrs.take("group").map(str::to_string);
    let state = parse_state(&mut attrs, diags);
    let perm = parse_perm(&mut attrs, diags);
    let timeout = parse_timeout(&mut attrs, diags);
    let rule = parse_rule(&mut attrs, diags);
    let timestamp = parse_timestamp(&mut attrs, diags);
    let comment = attrs.take("message").map(str::to_string);
    attrs.finish(diags);

    if kind == PropertyKind::Light {
        if perm.is_some() {
            diags.push(Diagnostic::warning(
                "light vectors carry no perm; kept as received".to_string(),
            ));
        }
        if timeout.is_some() {
            diags.push(Diagnostic::warning(
                "light vectors carry no timeout; kept as received".to_string(),
            ));
        }
    }
    if rule.is_some() && kind != PropertyKind::Switch {
        diags.push(Diagnostic::warning(format!(
            "rule applies to switch vectors only, not {}; kept as received",
            kind
        )));
    }

    let values = parse_values(raw, kind, "def", &name, diags);
    if values.is_empty() {
        diags.push(Diagnostic::error(format!(
            "<{}> defines no values",
            raw.name
        )));
    }
    if kind == PropertyKind::Switch {
        validate_switch_rule(rule, &values, diags);
    }

    Payload::DefineProperty(DefineProperty {
        kind,
        device,
        name,
        group,
        label,
        perm,
        state,
        timeout,
        rule,
        values,
        timestamp,
        comment,
    })
}

fn update(raw: &RawElement, kind: PropertyKind, diags: &mut Vec<Diagnostic>) -> Payload {
    let mut attrs = Attrs::new(raw);
    let device = attrs.required("device", diags);
    let name = PropertyName::parse(&attrs.required("name", diags));
    let state = parse_state(&mut attrs, diags);
    let timeout = parse_timeout(&mut attrs, diags);
    let timestamp = parse_timestamp(&mut attrs, diags);
    let comment = attrs.take("message").map(str::to_string);
    attrs.finish(diags);

    let values = parse_values(raw, kind, "one", &name, diags);

    Payload::UpdateProperty(UpdateProperty {
        kind,
        device,
        name,
        state,
        timeout,
        values,
        timestamp,
        comment,
    })
}

fn set(raw: &RawElement, kind: PropertyKind, diags: &mut Vec<Diagnostic>) -> Payload {
    let mut attrs = Attrs::new(raw);
    let device = attrs.required("device", diags);
    let name = PropertyName::parse(&attrs.required("name", diags));
    // Clients may stamp their writes; nothing downstream needs it.
    let _ = attrs.take("timestamp");
    attrs.finish(diags);

    let values = parse_values(raw, kind, "one", &name, diags);

    Payload::SetProperty(SetProperty {
        kind,
        device,
        name,
        values,
    })
}

fn delete(raw: &RawElement, diags: &mut Vec<Diagnostic>) -> Payload {
    let mut attrs = Attrs::new(raw);
    let device = attrs.take("device").map(str::to_string);
    let name = attrs.take("name").map(PropertyName::parse);
    let timestamp = parse_timestamp(&mut attrs, diags);
    let comment = attrs.take("message").map(str::to_string);
    attrs.finish(diags);
    warn_children(raw, diags);

    if name.is_some() && device.is_none() {
        diags.push(Diagnostic::error(
            "<delProperty> names a property without a device".to_string(),
        ));
    }

    Payload::DeleteProperty(DeleteProperty {
        device,
        name,
        timestamp,
        comment,
    })
}

fn enable_blob(raw: &RawElement, diags: &mut Vec<Diagnostic>) -> Payload {
    let mut attrs = Attrs::new(raw);
    let device = attrs.required("device", diags);
    let name = PropertyName::parse(&attrs.required("name", diags));
    // Classic INDI carries the policy as text content; some emitters use a
    // `state` attribute instead. Accept both, text winning.
    let attr_state = attrs.take("state");
    let spelled = if raw.text.is_empty() {
        attr_state
    } else {
        Some(raw.text.as_str())
    };
    let state = spelled.and_then(|s| match BlobSending::from_str(s) {
        Ok(state) => Some(state),
        Err(_) => {
            diags.push(Diagnostic::warning(format!(
                "invalid BLOB sending mode `{}`",
                s
            )));
            None
        }
    });
    attrs.finish(diags);
    warn_children(raw, diags);

    Payload::EnableBlob(EnableBlob {
        device,
        name,
        state,
    })
}

fn server_message(raw: &RawElement, diags: &mut Vec<Diagnostic>) -> Payload {
    let mut attrs = Attrs::new(raw);
    let device = attrs.take("device").map(str::to_string);
    let timestamp = parse_timestamp(&mut attrs, diags);
    let text = attrs
        .take("message")
        .map(str::to_string)
        .unwrap_or_else(|| raw.text.clone());
    attrs.finish(diags);
    warn_children(raw, diags);

    Payload::ServerMessage(ServerMessage {
        device,
        timestamp,
        text,
    })
}

fn uid_of(raw: &RawElement, diags: &mut Vec<Diagnostic>) -> Option<String> {
    let mut attrs = Attrs::new(raw);
    let uid = attrs
        .take("uid")
        .filter(|u| !u.is_empty())
        .map(str::to_string);
    attrs.finish(diags);
    warn_children(raw, diags);
    uid
}

fn parse_values(
    raw: &RawElement,
    kind: PropertyKind,
    prefix: &str,
    property: &PropertyName,
    diags: &mut Vec<Diagnostic>,
) -> Vec<Value> {
    let expected = format!("{}{}", prefix, kind.wire_name());
    let mut values = Vec::new();
    for child in &raw.children {
        if child.name != expected {
            diags.push(Diagnostic::warning(format!(
                "unexpected child <{}> in <{}> discarded",
                child.name, raw.name
            )));
            continue;
        }
        values.push(parse_value(child, kind, prefix == "def", property, diags));
    }
    values
}

fn parse_value(
    child: &RawElement,
    kind: PropertyKind,
    is_definition: bool,
    property: &PropertyName,
    diags: &mut Vec<Diagnostic>,
) -> Value {
    let mut attrs = Attrs::new(child);
    let name = ValueName::parse(&attrs.required("name", diags));
    check_value_name(property, &name, diags);

    let label = if is_definition {
        attrs.take("label").map(str::to_string)
    } else {
        None
    };

    let mut format_hint = None;
    let mut min = None;
    let mut max = None;
    let mut step = None;
    let mut unit = None;
    let mut size = None;
    let mut compressed = None;

    match kind {
        PropertyKind::Number if is_definition => {
            format_hint = attrs.take("format").map(str::to_string);
            min = parse_f64_attr(&mut attrs, "min", diags);
            max = parse_f64_attr(&mut attrs, "max", diags);
            step = parse_f64_attr(&mut attrs, "step", diags);
            unit = attrs.take("unit").map(str::to_string);
            if let (Some(lo), Some(hi)) = (min, max) {
                if lo > hi {
                    diags.push(Diagnostic::warning(format!(
                        "min {} exceeds max {} on `{}`",
                        lo, hi, name
                    )));
                }
            }
        }
        PropertyKind::Blob => {
            if is_definition {
                format_hint = attrs.take("format").map(str::to_string);
            } else {
                format_hint = attrs.take("format").map(str::to_string);
                size = parse_u64_attr(&mut attrs, "size", diags);
                compressed = attrs.take("compressed").and_then(|raw| {
                    match switch::parse(raw) {
                        Some(b) => Some(b),
                        None => {
                            diags.push(Diagnostic::warning(format!(
                                "invalid compressed flag `{}`",
                                raw
                            )));
                            None
                        }
                    }
                });
            }
        }
        _ => {}
    }

    let text = child.text.as_str();
    let payload = match kind {
        PropertyKind::Text => ValuePayload::Text(text.to_string()),
        PropertyKind::Number => match format::parse_number(text) {
            Ok(n) => {
                if min.is_some_and(|lo| n < lo) || max.is_some_and(|hi| n > hi) {
                    diags.push(Diagnostic::warning(format!(
                        "value {} of `{}` is outside [{}, {}]",
                        n,
                        name,
                        min.map(|v| v.to_string()).unwrap_or_default(),
                        max.map(|v| v.to_string()).unwrap_or_default()
                    )));
                }
                ValuePayload::Number(n)
            }
            Err(_) => {
                diags.push(Diagnostic::error(format!(
                    "invalid number `{}` for `{}`; using 0",
                    text, name
                )));
                ValuePayload::Number(0.0)
            }
        },
        PropertyKind::Switch => match switch::parse(text) {
            Some(b) => ValuePayload::Boolean(b),
            None => {
                diags.push(Diagnostic::warning(format!(
                    "invalid switch value `{}` for `{}`; using Off",
                    text, name
                )));
                ValuePayload::Boolean(false)
            }
        },
        PropertyKind::Light => match Status::from_str_lenient(text) {
            Some((state, false)) => ValuePayload::State(state),
            Some((state, true)) => {
                diags.push(Diagnostic::warning(format!(
                    "light value `{}` coerced to `{}`",
                    text, state
                )));
                ValuePayload::State(state)
            }
            None => {
                diags.push(Diagnostic::error(format!(
                    "invalid light value `{}` for `{}`; using Idle",
                    text, name
                )));
                ValuePayload::State(Status::Idle)
            }
        },
        PropertyKind::Blob => {
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            // Undecodable payloads collapse to empty bytes without an error:
            // servers legitimately withhold BLOB bodies when transfer is off.
            match BASE64.decode(compact.as_bytes()) {
                Ok(bytes) => ValuePayload::Blob(bytes),
                Err(_) => ValuePayload::Blob(Vec::new()),
            }
        }
    };

    attrs.finish(diags);
    for grandchild in &child.children {
        diags.push(Diagnostic::warning(format!(
            "unexpected child <{}> in <{}> discarded",
            grandchild.name, child.name
        )));
    }

    Value {
        name,
        payload,
        label,
        format: format_hint,
        min,
        max,
        step,
        unit,
        size,
        compressed,
    }
}

fn validate_switch_rule(
    rule: Option<SwitchRule>,
    values: &[Value],
    diags: &mut Vec<Diagnostic>,
) {
    let Some(rule) = rule else {
        return;
    };
    let on_count = values
        .iter()
        .filter(|v| v.as_switch() == Some(true))
        .count();
    let violated = match rule {
        SwitchRule::OneOfMany => on_count != 1,
        SwitchRule::AtMostOne => on_count > 1,
        SwitchRule::AnyOfMany => false,
    };
    if violated {
        diags.push(Diagnostic::error(format!(
            "switch rule {} violated: {} values are On",
            rule, on_count
        )));
    }
}
