//! Wire serialization of the client-sendable subset
//!
//! Output is bit-exact: attributes are emitted in a fixed order, the five
//! XML entities are escaped, `getProperties` keeps its classic single-quoted
//! version attribute, and `enableBLOB` uses the text-content policy form.
//! The terminating newline is the session layer's business, not ours.

use super::{Payload, SetProperty, Value, ValuePayload};
use crate::error::{Error, Result};
use crate::property::{switch, BlobSending};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use quick_xml::escape::escape;
use std::fmt::Write;

pub(super) fn to_xml(payload: &Payload) -> Result<String> {
    match payload {
        Payload::GetProperties(gp) => {
            let mut out = format!("<getProperties version='{}'", escape(&gp.version));
            if let Some(device) = &gp.device {
                write!(out, " device=\"{}\"", escape(device))?;
            }
            if let Some(name) = &gp.name {
                write!(out, " name=\"{}\"", escape(name.as_str()))?;
            }
            out.push_str("/>");
            Ok(out)
        }
        Payload::SetProperty(sp) => set_property(sp),
        Payload::EnableBlob(eb) => {
            let state = eb.state.unwrap_or(BlobSending::Never);
            Ok(format!(
                "<enableBLOB device=\"{}\" name=\"{}\">{}</enableBLOB>",
                escape(&eb.device),
                escape(eb.name.as_str()),
                state
            ))
        }
        Payload::PingReply(pr) => match pr.uid.as_deref().filter(|u| !u.is_empty()) {
            Some(uid) => Ok(format!("<pingReply uid=\"{}\"/>", escape(uid))),
            None => Ok("<pingReply/>".to_string()),
        },
        Payload::ServerMessage(sm) => {
            let mut out = String::from("<message");
            if let Some(device) = &sm.device {
                write!(out, " device=\"{}\"", escape(device))?;
            }
            if let Some(timestamp) = &sm.timestamp {
                write!(out, " timestamp=\"{}\"", timestamp)?;
            }
            if !sm.text.is_empty() {
                write!(out, " message=\"{}\"", escape(&sm.text))?;
            }
            out.push_str("/>");
            Ok(out)
        }
        other => Err(Error::NotSerializable(other.variant_name())),
    }
}

fn set_property(sp: &SetProperty) -> Result<String> {
    let tag = format!("new{}Vector", sp.kind.wire_name());
    let child_tag = format!("one{}", sp.kind.wire_name());
    let mut out = format!(
        "<{} device=\"{}\" name=\"{}\">",
        tag,
        escape(&sp.device),
        escape(sp.name.as_str())
    );
    for value in &sp.values {
        write_one(&mut out, &child_tag, value)?;
    }
    write!(out, "</{}>", tag)?;
    Ok(out)
}

fn write_one(out: &mut String, tag: &str, value: &Value) -> Result<()> {
    write!(out, "<{} name=\"{}\"", tag, escape(value.name.as_str()))?;
    if let ValuePayload::Blob(_) = value.payload {
        if let Some(size) = value.size {
            write!(out, " size=\"{}\"", size)?;
        }
        if let Some(format) = &value.format {
            write!(out, " format=\"{}\"", escape(format))?;
        }
        if let Some(compressed) = value.compressed {
            write!(out, " compressed=\"{}\"", switch::emit(compressed))?;
        }
    }
    out.push('>');
    match &value.payload {
        ValuePayload::Text(s) => out.push_str(&escape(s.as_str())),
        ValuePayload::Number(n) => write!(out, "{}", n)?,
        ValuePayload::Boolean(b) => out.push_str(switch::emit(*b)),
        ValuePayload::State(s) => write!(out, "{}", s)?,
        ValuePayload::Blob(bytes) => out.push_str(&BASE64.encode(bytes)),
    }
    write!(out, "</{}>", tag)?;
    Ok(())
}
