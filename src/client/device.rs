//! Device and property snapshots
//!
//! The registry projects the inbound message stream into these types. A
//! [`Property`] keeps both the authoritative values published by the server
//! and the optional target values written locally; local writes never touch
//! the current values.

use crate::error::{Error, Result};
use crate::format::{NumberFormat, SexagesimalStyle};
use crate::message::{DefineProperty, UpdateProperty, Value, ValuePayload};
use crate::names::PropertyName;
use crate::property::{Permission, PropertyKind, Status, SwitchRule};
use crate::timestamp::IndiTimestamp;

/// Device connectivity derived from the `CONNECTION` property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not connected and no pending request
    Disconnected,
    /// Connect requested, not yet confirmed by the server
    Connecting,
    /// Connected
    Connected,
    /// Disconnect requested, not yet confirmed by the server
    Disconnecting,
}

/// One property of a device
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property name
    pub name: PropertyName,
    /// Property kind
    pub kind: PropertyKind,
    /// GUI grouping
    pub group: Option<String>,
    /// GUI label
    pub label: Option<String>,
    /// Client write permission
    pub perm: Option<Permission>,
    /// Current state
    pub state: Option<Status>,
    /// Worst-case completion time in seconds
    pub timeout: Option<f64>,
    /// Switch rule (switch properties)
    pub rule: Option<SwitchRule>,
    /// Display or payload format hint
    pub format: Option<String>,
    /// Moment the current values were valid
    pub timestamp: Option<IndiTimestamp>,
    /// Moment of the last local target write
    pub target_timestamp: Option<IndiTimestamp>,
    values: Vec<Value>,
    target_values: Option<Vec<Value>>,
}

impl Property {
    fn from_parts(
        name: PropertyName,
        kind: PropertyKind,
        values: Vec<Value>,
    ) -> Self {
        let format = values.iter().find_map(|v| v.format.clone());
        Self {
            name,
            kind,
            group: None,
            label: None,
            perm: None,
            state: None,
            timeout: None,
            rule: None,
            format,
            timestamp: None,
            target_timestamp: None,
            values,
            target_values: None,
        }
    }

    pub(crate) fn from_define(def: DefineProperty) -> Self {
        let mut property = Self::from_parts(def.name.clone(), def.kind, Vec::new());
        property.apply_define(def);
        property
    }

    pub(crate) fn from_update(upd: UpdateProperty) -> Self {
        let mut property = Self::from_parts(upd.name.clone(), upd.kind, Vec::new());
        property.apply_update(upd);
        property
    }

    /// Fold a definition in; metadata established earlier survives unless
    /// the server restates it.
    pub(crate) fn apply_define(&mut self, def: DefineProperty) {
        self.kind = def.kind;
        if def.group.is_some() {
            self.group = def.group;
        }
        if def.label.is_some() {
            self.label = def.label;
        }
        if def.perm.is_some() {
            self.perm = def.perm;
        }
        if def.state.is_some() {
            self.state = def.state;
        }
        if def.timeout.is_some() {
            self.timeout = def.timeout;
        }
        if def.rule.is_some() {
            self.rule = def.rule;
        }
        if def.timestamp.is_some() {
            self.timestamp = def.timestamp;
        }
        self.merge_values(def.values);
    }

    /// Fold a value update in
    pub(crate) fn apply_update(&mut self, upd: UpdateProperty) {
        self.kind = upd.kind;
        if upd.state.is_some() {
            self.state = upd.state;
        }
        if upd.timeout.is_some() {
            self.timeout = upd.timeout;
        }
        if upd.timestamp.is_some() {
            self.timestamp = upd.timestamp;
        }
        self.merge_values(upd.values);
    }

    fn merge_values(&mut self, incoming: Vec<Value>) {
        for value in incoming {
            match self.values.iter_mut().find(|v| v.name == value.name) {
                Some(existing) => existing.merge_update(value),
                None => self.values.push(value),
            }
        }
        if self.format.is_none() {
            self.format = self.values.iter().find_map(|v| v.format.clone());
        }
    }

    /// Current values in definition order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Locally written target values, if any
    pub fn target_values(&self) -> Option<&[Value]> {
        self.target_values.as_deref()
    }

    /// Look up a current value by element name
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|v| v.name.as_str() == name)
    }

    /// Text payload of a current value
    pub fn text_value(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_text)
    }

    /// Number payload of a current value
    pub fn number_value(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(Value::as_number)
    }

    /// Switch payload of a current value
    pub fn switch_value(&self, name: &str) -> Option<bool> {
        self.value(name).and_then(Value::as_switch)
    }

    /// Light payload of a current value
    pub fn light_value(&self, name: &str) -> Option<Status> {
        self.value(name).and_then(Value::as_light)
    }

    /// BLOB payload of a current value
    pub fn blob_value(&self, name: &str) -> Option<&[u8]> {
        self.value(name).and_then(Value::as_blob)
    }

    /// Render a number element through its format hint
    ///
    /// Falls back to plain decimal when the element carries no format or the
    /// hint does not parse.
    pub fn formatted_number(&self, name: &str, style: SexagesimalStyle) -> Option<String> {
        let value = self.value(name)?;
        let number = value.as_number()?;
        let rendered = value
            .format
            .as_deref()
            .and_then(|hint| NumberFormat::parse(hint).ok())
            .and_then(|format| format.format(number, style).ok())
            .unwrap_or_else(|| number.to_string());
        Some(rendered)
    }

    /// Switch payload of a target value
    pub fn target_switch_value(&self, name: &str) -> Option<bool> {
        self.target_values
            .as_ref()?
            .iter()
            .find(|v| v.name.as_str() == name)
            .and_then(Value::as_switch)
    }

    fn targets_or_current(&self) -> Vec<Value> {
        self.target_values
            .clone()
            .unwrap_or_else(|| self.values.clone())
    }

    fn commit_targets(&mut self, targets: Vec<Value>) {
        self.target_values = Some(targets);
        self.target_timestamp = Some(IndiTimestamp::now(None));
    }

    /// Set the target for a text element
    pub fn set_target_text(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        if self.kind != PropertyKind::Text {
            return Err(Error::Property(format!(
                "property `{}` is {}, not Text",
                self.name, self.kind
            )));
        }
        let mut targets = self.targets_or_current();
        let target = find_target(&mut targets, &self.name, name)?;
        target.payload = ValuePayload::Text(value.into());
        self.commit_targets(targets);
        Ok(())
    }

    /// Set the target for a number element
    pub fn set_target_number(&mut self, name: &str, value: f64) -> Result<()> {
        if self.kind != PropertyKind::Number {
            return Err(Error::Property(format!(
                "property `{}` is {}, not Number",
                self.name, self.kind
            )));
        }
        let mut targets = self.targets_or_current();
        let target = find_target(&mut targets, &self.name, name)?;
        target.payload = ValuePayload::Number(value);
        self.commit_targets(targets);
        Ok(())
    }

    /// Set the target for a switch element, honoring the switch rule
    ///
    /// Turning an element on under `OneOfMany`/`AtMostOne` turns every other
    /// target off. Turning the lit element of a two-element `OneOfMany` off
    /// flips its sibling on; with more elements the request is ambiguous and
    /// fails. The resulting target set is validated against the rule before
    /// anything is committed.
    pub fn set_target_switch(&mut self, name: &str, on: bool) -> Result<()> {
        if self.kind != PropertyKind::Switch {
            return Err(Error::Property(format!(
                "property `{}` is {}, not Switch",
                self.name, self.kind
            )));
        }
        let rule = self.rule.unwrap_or(SwitchRule::AnyOfMany);
        let mut targets = self.targets_or_current();
        let index = targets
            .iter()
            .position(|v| v.name.as_str() == name)
            .ok_or_else(|| Error::ValueNotFound {
                property: self.name.to_string(),
                value: name.to_string(),
            })?;

        match (on, rule) {
            (true, SwitchRule::OneOfMany | SwitchRule::AtMostOne) => {
                for (i, target) in targets.iter_mut().enumerate() {
                    target.payload = ValuePayload::Boolean(i == index);
                }
            }
            (false, SwitchRule::OneOfMany) => {
                if targets.len() != 2 {
                    return Err(Error::RuleViolation(format!(
                        "turning `{}` off under OneOfMany is ambiguous with {} elements",
                        name,
                        targets.len()
                    )));
                }
                for (i, target) in targets.iter_mut().enumerate() {
                    target.payload = ValuePayload::Boolean(i != index);
                }
            }
            _ => {
                targets[index].payload = ValuePayload::Boolean(on);
            }
        }

        validate_switch_targets(rule, &targets)?;
        self.commit_targets(targets);
        Ok(())
    }

    /// Drop any local target state
    pub fn clear_targets(&mut self) {
        self.target_values = None;
        self.target_timestamp = None;
    }

    /// Connectivity reading of a `CONNECTION` property
    pub fn connection_status(&self) -> ConnectionStatus {
        let current = self.switch_value("CONNECT").unwrap_or(false);
        let target = self.target_switch_value("CONNECT");
        match (current, target) {
            (true, Some(false)) => ConnectionStatus::Disconnecting,
            (true, _) => ConnectionStatus::Connected,
            (false, Some(true)) => ConnectionStatus::Connecting,
            (false, _) => ConnectionStatus::Disconnected,
        }
    }

    /// Whether a client may read current values
    pub fn is_readable(&self) -> bool {
        !matches!(self.perm, Some(Permission::WriteOnly))
    }

    /// Whether a client may write targets
    pub fn is_writable(&self) -> bool {
        matches!(
            self.perm,
            Some(Permission::WriteOnly) | Some(Permission::ReadWrite)
        )
    }
}

fn find_target<'a>(
    targets: &'a mut [Value],
    property: &PropertyName,
    name: &str,
) -> Result<&'a mut Value> {
    targets
        .iter_mut()
        .find(|v| v.name.as_str() == name)
        .ok_or_else(|| Error::ValueNotFound {
            property: property.to_string(),
            value: name.to_string(),
        })
}

fn validate_switch_targets(rule: SwitchRule, targets: &[Value]) -> Result<()> {
    let on_count = targets
        .iter()
        .filter(|v| v.as_switch() == Some(true))
        .count();
    match rule {
        SwitchRule::OneOfMany if on_count != 1 => Err(Error::RuleViolation(format!(
            "OneOfMany requires exactly one On element, would have {}",
            on_count
        ))),
        SwitchRule::AtMostOne if on_count > 1 => Err(Error::RuleViolation(format!(
            "AtMostOne allows at most one On element, would have {}",
            on_count
        ))),
        _ => Ok(()),
    }
}

/// A device and its properties, in definition order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Device {
    name: String,
    properties: Vec<Property>,
}

impl Device {
    /// Create an empty device
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Device name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Properties in definition order
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Look up a property by name
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name.as_str() == name)
    }

    pub(crate) fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name.as_str() == name)
    }

    pub(crate) fn upsert_define(&mut self, def: DefineProperty) -> &Property {
        match self
            .properties
            .iter()
            .position(|p| p.name == def.name)
        {
            Some(index) => {
                self.properties[index].apply_define(def);
                &self.properties[index]
            }
            None => {
                self.properties.push(Property::from_define(def));
                self.properties.last().expect("just pushed")
            }
        }
    }

    pub(crate) fn upsert_update(&mut self, upd: UpdateProperty) -> &Property {
        match self
            .properties
            .iter()
            .position(|p| p.name == upd.name)
        {
            Some(index) => {
                self.properties[index].apply_update(upd);
                &self.properties[index]
            }
            None => {
                self.properties.push(Property::from_update(upd));
                self.properties.last().expect("just pushed")
            }
        }
    }

    pub(crate) fn remove_property(&mut self, name: &str) -> bool {
        let before = self.properties.len();
        self.properties.retain(|p| p.name.as_str() != name);
        self.properties.len() != before
    }

    /// Connectivity derived from the `CONNECTION` property
    pub fn connection_status(&self) -> ConnectionStatus {
        self.property(PropertyName::Connection.as_str())
            .map(Property::connection_status)
            .unwrap_or(ConnectionStatus::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;
    use crate::names::ValueName;

    fn define_connection(connect: bool) -> DefineProperty {
        DefineProperty {
            kind: PropertyKind::Switch,
            device: "Scope".to_string(),
            name: PropertyName::Connection,
            group: Some("Main".to_string()),
            label: Some("Connection".to_string()),
            perm: Some(Permission::ReadWrite),
            state: Some(Status::Idle),
            timeout: Some(60.0),
            rule: Some(SwitchRule::OneOfMany),
            values: vec![
                Value::switch(ValueName::Connect, connect),
                Value::switch(ValueName::Disconnect, !connect),
            ],
            timestamp: None,
            comment: None,
        }
    }

    fn define_coords() -> DefineProperty {
        let mut ra = Value::number(ValueName::Ra, 12.0);
        ra.format = Some("%010.6m".to_string());
        ra.min = Some(0.0);
        ra.max = Some(24.0);
        ra.unit = Some("hours".to_string());
        DefineProperty {
            kind: PropertyKind::Number,
            device: "Scope".to_string(),
            name: PropertyName::EquatorialEodCoord,
            group: None,
            label: None,
            perm: Some(Permission::ReadWrite),
            state: Some(Status::Idle),
            timeout: None,
            rule: None,
            values: vec![ra, Value::number(ValueName::Dec, 45.0)],
            timestamp: None,
            comment: None,
        }
    }

    fn update_ra(value: f64) -> UpdateProperty {
        UpdateProperty {
            kind: PropertyKind::Number,
            device: "Scope".to_string(),
            name: PropertyName::EquatorialEodCoord,
            state: Some(Status::Busy),
            timeout: None,
            values: vec![Value::number(ValueName::Ra, value)],
            timestamp: None,
            comment: None,
        }
    }

    #[test]
    fn test_update_preserves_defined_metadata() {
        let mut device = Device::new("Scope");
        device.upsert_define(define_coords());
        device.upsert_update(update_ra(15.5));

        let property = device.property("EQUATORIAL_EOD_COORD").unwrap();
        assert_eq!(property.state, Some(Status::Busy));
        let ra = property.value("RA").unwrap();
        assert_eq!(ra.as_number(), Some(15.5));
        assert_eq!(ra.format.as_deref(), Some("%010.6m"));
        assert_eq!(ra.min, Some(0.0));
        assert_eq!(ra.max, Some(24.0));
        assert_eq!(ra.unit.as_deref(), Some("hours"));
        // The untouched element is still there.
        assert_eq!(property.number_value("DEC"), Some(45.0));
    }

    #[test]
    fn test_update_for_unseen_value_is_kept_verbatim() {
        let mut device = Device::new("Scope");
        device.upsert_define(define_coords());
        device.upsert_update(UpdateProperty {
            values: vec![Value::number("EPOCH", 2000.0)],
            ..update_ra(12.0)
        });
        let property = device.property("EQUATORIAL_EOD_COORD").unwrap();
        assert_eq!(property.number_value("EPOCH"), Some(2000.0));
    }

    #[test]
    fn test_update_before_define_creates_property() {
        let mut device = Device::new("Scope");
        device.upsert_update(update_ra(1.0));
        assert_eq!(
            device
                .property("EQUATORIAL_EOD_COORD")
                .unwrap()
                .number_value("RA"),
            Some(1.0)
        );
    }

    #[test]
    fn test_set_target_switch_one_of_many_exclusion() {
        let mut device = Device::new("Scope");
        device.upsert_define(define_connection(false));
        let property = device.property_mut("CONNECTION").unwrap();

        property.set_target_switch("CONNECT", true).unwrap();
        assert_eq!(property.target_switch_value("CONNECT"), Some(true));
        assert_eq!(property.target_switch_value("DISCONNECT"), Some(false));
        // Current values are untouched by local writes.
        assert_eq!(property.switch_value("CONNECT"), Some(false));
        assert!(property.target_timestamp.is_some());
    }

    #[test]
    fn test_one_of_many_binary_flip() {
        let mut device = Device::new("Scope");
        device.upsert_define(define_connection(true));
        let property = device.property_mut("CONNECTION").unwrap();

        property.set_target_switch("CONNECT", false).unwrap();
        assert_eq!(property.target_switch_value("CONNECT"), Some(false));
        assert_eq!(property.target_switch_value("DISCONNECT"), Some(true));
    }

    #[test]
    fn test_one_of_many_off_with_three_elements_fails() {
        let mut def = define_connection(true);
        def.values.push(Value::switch("STANDBY", false));
        let mut device = Device::new("Scope");
        device.upsert_define(def);
        let property = device.property_mut("CONNECTION").unwrap();

        let result = property.set_target_switch("CONNECT", false);
        assert!(matches!(result, Err(Error::RuleViolation(_))));
        // Nothing was committed.
        assert!(property.target_values().is_none());
    }

    #[test]
    fn test_any_of_many_sets_only_named_element() {
        let mut def = define_connection(false);
        def.rule = Some(SwitchRule::AnyOfMany);
        def.values.push(Value::switch("STANDBY", true));
        let mut device = Device::new("Scope");
        device.upsert_define(def);
        let property = device.property_mut("CONNECTION").unwrap();

        property.set_target_switch("CONNECT", true).unwrap();
        assert_eq!(property.target_switch_value("CONNECT"), Some(true));
        assert_eq!(property.target_switch_value("STANDBY"), Some(true));
    }

    #[test]
    fn test_target_write_unknown_element_fails() {
        let mut device = Device::new("Scope");
        device.upsert_define(define_connection(false));
        let property = device.property_mut("CONNECTION").unwrap();
        assert!(matches!(
            property.set_target_switch("WARP", true),
            Err(Error::ValueNotFound { .. })
        ));
    }

    #[test]
    fn test_target_write_kind_mismatch_fails() {
        let mut device = Device::new("Scope");
        device.upsert_define(define_connection(false));
        let property = device.property_mut("CONNECTION").unwrap();
        assert!(property.set_target_number("CONNECT", 1.0).is_err());
        assert!(property.set_target_text("CONNECT", "on").is_err());
    }

    #[test]
    fn test_set_target_number_and_text() {
        let mut device = Device::new("Scope");
        device.upsert_define(define_coords());
        let property = device.property_mut("EQUATORIAL_EOD_COORD").unwrap();
        property.set_target_number("RA", 15.5).unwrap();
        let targets = property.target_values().unwrap();
        assert_eq!(
            targets.iter().find(|v| v.name.as_str() == "RA").unwrap().as_number(),
            Some(15.5)
        );

        let mut device = Device::new("Scope");
        device.upsert_define(DefineProperty {
            kind: PropertyKind::Text,
            device: "Scope".to_string(),
            name: PropertyName::DevicePort,
            group: None,
            label: None,
            perm: Some(Permission::ReadWrite),
            state: None,
            timeout: None,
            rule: None,
            values: vec![Value::text(ValueName::Port, "/dev/ttyUSB0")],
            timestamp: None,
            comment: None,
        });
        let property = device.property_mut("DEVICE_PORT").unwrap();
        property.set_target_text("PORT", "/dev/ttyUSB1").unwrap();
        assert_eq!(
            property.target_values().unwrap()[0].as_text(),
            Some("/dev/ttyUSB1")
        );
    }

    #[test]
    fn test_connection_status_transitions() {
        let mut device = Device::new("Scope");
        device.upsert_define(define_connection(false));
        assert_eq!(device.connection_status(), ConnectionStatus::Disconnected);

        device
            .property_mut("CONNECTION")
            .unwrap()
            .set_target_switch("CONNECT", true)
            .unwrap();
        assert_eq!(device.connection_status(), ConnectionStatus::Connecting);

        device.upsert_update(UpdateProperty {
            kind: PropertyKind::Switch,
            device: "Scope".to_string(),
            name: PropertyName::Connection,
            state: Some(Status::Ok),
            timeout: None,
            values: vec![
                Value::switch(ValueName::Connect, true),
                Value::switch(ValueName::Disconnect, false),
            ],
            timestamp: None,
            comment: None,
        });
        assert_eq!(device.connection_status(), ConnectionStatus::Connected);

        device
            .property_mut("CONNECTION")
            .unwrap()
            .set_target_switch("CONNECT", false)
            .unwrap();
        assert_eq!(device.connection_status(), ConnectionStatus::Disconnecting);
    }

    #[test]
    fn test_formatted_number_uses_format_hint() {
        let mut device = Device::new("Scope");
        device.upsert_define(define_coords());
        let property = device.property("EQUATORIAL_EOD_COORD").unwrap();
        assert_eq!(
            property.formatted_number("RA", SexagesimalStyle::Hms).unwrap(),
            "012\u{2b0}00\u{1d50}00\u{2e2}"
        );
        // DEC has no format hint and falls back to plain decimal.
        assert_eq!(
            property.formatted_number("DEC", SexagesimalStyle::Dms).unwrap(),
            "45"
        );
    }

    #[test]
    fn test_permissions() {
        let mut device = Device::new("Scope");
        device.upsert_define(define_connection(false));
        let property = device.property("CONNECTION").unwrap();
        assert!(property.is_readable());
        assert!(property.is_writable());
    }
}
