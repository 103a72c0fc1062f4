use std::fmt::Write;

use crate::error::{Error, Result};
use crate::p4::Record;
use crate::types::{ClientSpec, Mapping};

/// Builds a client definition from the record printed by `client -o`.
///
/// A view line that does not split into exactly two paths means the
/// definition on the server is broken, so it is rejected outright.
pub fn from_record(record: &Record) -> Result<ClientSpec> {
    let name = record.require("client", "Client")?.to_string();

    let view = record
        .indexed("View")
        .into_iter()
        .map(|line| {
            Mapping::parse_line(line).ok_or_else(|| Error::MalformedViewLine {
                client: name.clone(),
                line: line.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let field = |key: &str| record.get(key).unwrap_or_default().to_string();

    Ok(ClientSpec {
        root: record.require("client", "Root")?.to_string(),
        owner: field("Owner"),
        host: field("Host"),
        description: field("Description"),
        options: field("Options"),
        submit_options: field("SubmitOptions"),
        line_end: field("LineEnd"),
        view,
        name,
    })
}

/// Renders a client definition in the form accepted by `client -i`.
#[must_use]
pub fn to_spec_form(spec: &ClientSpec) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Client:\t{}", spec.name);
    write_field(&mut out, "Owner", &spec.owner);
    write_field(&mut out, "Host", &spec.host);

    out.push_str("\nDescription:\n");
    for line in spec.description.lines() {
        let _ = writeln!(out, "\t{line}");
    }

    out.push('\n');
    let _ = writeln!(out, "Root:\t{}", spec.root);
    write_field(&mut out, "Options", &spec.options);
    write_field(&mut out, "SubmitOptions", &spec.submit_options);
    write_field(&mut out, "LineEnd", &spec.line_end);

    out.push_str("\nView:\n");
    for mapping in &spec.view {
        let _ = writeln!(out, "\t{mapping}");
    }

    out
}

fn write_field(out: &mut String, key: &str, value: &str) {
    if !value.is_empty() {
        let _ = writeln!(out, "{key}:\t{value}");
    }
}
