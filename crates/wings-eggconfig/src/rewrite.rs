// SPDX-License-Identifier: MIT

//! Process-configuration file rewriting, applied against known file paths
//! at start time (spec.md §4.5.2).

use crate::error::EggConfigError;
use regex::Regex;
use wings_core::ConfigFileFormat;

/// Apply `replacements` to `contents`, dispatching on `format`.
///
/// For [`ConfigFileFormat::Raw`], each replacement's `match` is a regex
/// pattern; for structured formats it is a dotted key path.
pub fn apply(format: ConfigFileFormat, contents: &str, replacements: &[(String, String)]) -> Result<String, EggConfigError> {
    match format {
        ConfigFileFormat::Raw => rewrite_raw(contents, replacements),
        ConfigFileFormat::Json => rewrite_json(contents, replacements),
        ConfigFileFormat::Yaml => rewrite_yaml(contents, replacements),
        ConfigFileFormat::Ini => rewrite_ini(contents, replacements),
        ConfigFileFormat::Properties => rewrite_properties(contents, replacements),
    }
}

fn rewrite_raw(contents: &str, replacements: &[(String, String)]) -> Result<String, EggConfigError> {
    let mut out = contents.to_string();
    for (pattern, replacement) in replacements {
        let regex = Regex::new(pattern)?;
        out = regex.replace_all(&out, replacement.as_str()).into_owned();
    }
    Ok(out)
}

fn rewrite_json(contents: &str, replacements: &[(String, String)]) -> Result<String, EggConfigError> {
    let mut value: serde_json::Value = if contents.trim().is_empty() {
        serde_json::Value::Object(Default::default())
    } else {
        serde_json::from_str(contents)?
    };
    for (path, replacement) in replacements {
        set_json_path(&mut value, path, serde_json::Value::String(replacement.clone()));
    }
    Ok(serde_json::to_string_pretty(&value)?)
}

fn set_json_path(root: &mut serde_json::Value, dotted_path: &str, new_value: serde_json::Value) {
    let mut cursor = root;
    let parts: Vec<&str> = dotted_path.split('.').collect();
    for part in &parts[..parts.len() - 1] {
        if !cursor.is_object() {
            *cursor = serde_json::Value::Object(Default::default());
        }
        cursor = cursor
            .as_object_mut()
            .expect("just normalized to an object")
            .entry(part.to_string())
            .or_insert_with(|| serde_json::Value::Object(Default::default()));
    }
    if !cursor.is_object() {
        *cursor = serde_json::Value::Object(Default::default());
    }
    cursor
        .as_object_mut()
        .expect("just normalized to an object")
        .insert(parts[parts.len() - 1].to_string(), new_value);
}

fn rewrite_yaml(contents: &str, replacements: &[(String, String)]) -> Result<String, EggConfigError> {
    let mut value: serde_yaml::Value = if contents.trim().is_empty() {
        serde_yaml::Value::Mapping(Default::default())
    } else {
        serde_yaml::from_str(contents)?
    };
    for (path, replacement) in replacements {
        set_yaml_path(&mut value, path, serde_yaml::Value::String(replacement.clone()));
    }
    Ok(serde_yaml::to_string(&value)?)
}

fn set_yaml_path(root: &mut serde_yaml::Value, dotted_path: &str, new_value: serde_yaml::Value) {
    let mut cursor = root;
    let parts: Vec<&str> = dotted_path.split('.').collect();
    for part in &parts[..parts.len() - 1] {
        if !cursor.is_mapping() {
            *cursor = serde_yaml::Value::Mapping(Default::default());
        }
        let mapping = cursor.as_mapping_mut().expect("just normalized to a mapping");
        let key = serde_yaml::Value::String(part.to_string());
        cursor = mapping.entry(key).or_insert_with(|| serde_yaml::Value::Mapping(Default::default()));
    }
    if !cursor.is_mapping() {
        *cursor = serde_yaml::Value::Mapping(Default::default());
    }
    cursor
        .as_mapping_mut()
        .expect("just normalized to a mapping")
        .insert(serde_yaml::Value::String(parts[parts.len() - 1].to_string()), new_value);
}

fn rewrite_ini(contents: &str, replacements: &[(String, String)]) -> Result<String, EggConfigError> {
    let mut conf = ini::Ini::load_from_str(contents)?;
    for (path, replacement) in replacements {
        let (section, key) = split_section_key(path);
        conf.with_section(section).set(key, replacement.as_str());
    }
    let mut out = Vec::new();
    conf.write_to(&mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Java-style `.properties` files are flat `key=value` lines — rewritten
/// with a `key=` line-prefix match rather than a full INI section parse,
/// appending the key if it wasn't already present.
fn rewrite_properties(contents: &str, replacements: &[(String, String)]) -> Result<String, EggConfigError> {
    let mut lines: Vec<String> = contents.lines().map(String::from).collect();
    for (key, replacement) in replacements {
        let prefix = format!("{key}=");
        if let Some(existing) = lines.iter_mut().find(|line| line.starts_with(&prefix)) {
            *existing = format!("{key}={replacement}");
        } else {
            lines.push(format!("{key}={replacement}"));
        }
    }
    Ok(lines.join("\n"))
}

fn split_section_key(dotted_path: &str) -> (Option<&str>, &str) {
    match dotted_path.split_once('.') {
        Some((section, key)) => (Some(section), key),
        None => (None, dotted_path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_regex_replacement() {
        let out = rewrite_raw("port=25565\n", &[("port=\\d+".to_string(), "port=25566".to_string())]).unwrap();
        assert_eq!(out, "port=25566\n");
    }

    #[test]
    fn json_dotted_path_sets_nested_key() {
        let out = rewrite_json("{}", &[("server.port".to_string(), "25566".to_string())]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["server"]["port"], "25566");
    }

    #[test]
    fn yaml_dotted_path_sets_nested_key() {
        let out = rewrite_yaml("", &[("server.port".to_string(), "25566".to_string())]).unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(value["server"]["port"].as_str(), Some("25566"));
    }

    #[test]
    fn ini_section_key_replacement() {
        let out = rewrite_ini("[server]\nport=25565\n", &[("server.port".to_string(), "25566".to_string())]).unwrap();
        assert!(out.contains("port=25566"));
    }

    #[test]
    fn properties_replaces_existing_key_in_place() {
        let out = rewrite_properties("max-players=20\nmotd=hi\n", &[("max-players".to_string(), "50".to_string())]).unwrap();
        assert!(out.lines().any(|line| line == "max-players=50"));
        assert!(out.lines().any(|line| line == "motd=hi"));
    }

    #[test]
    fn properties_appends_missing_key() {
        let out = rewrite_properties("motd=hi", &[("max-players".to_string(), "50".to_string())]).unwrap();
        assert!(out.lines().any(|line| line == "max-players=50"));
    }
}
