//! SMF ("Snype map format") text parser
//!
//! ```text
//! #! v1
//! ---
//! name: "Ascent"
//! wallHeight: 4
//! ---
//! Spawn 1 1 0 90
//! Wall 0 0 20 0.5
//! Box 4 4 0 2 2 1 --color 0x2a2a2a
//! Ramp 6 4 0 4 2 1 "+x"
//! PowerUp 10 10 0.5 --type "speed"
//! ```

use glam::{Vec2, Vec3};
use serde_json::{Number, Value};

use crate::physics::RampOrientation;
use crate::ws::protocol::PowerUpKind;

use super::{GameMap, MapError, MapObject, Metadata, Options, PowerUpSpawn, SpawnPoint};

const SUPPORTED_VERSIONS: &[&str] = &["v1"];

/// Parse a whole map file
pub fn parse(text: &str) -> Result<GameMap, MapError> {
    let mut lines = text.lines().enumerate();
    check_header(lines.next())?;

    let mut map = GameMap::default();
    let mut section = 0;

    for (idx, raw) in lines {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        if line.starts_with("---") {
            section += 1;
            continue;
        }

        match section {
            1 => {
                if let Some((key, value)) = metadata_entry(line) {
                    map.metadata.insert(key, value);
                }
            }
            2 => parse_object_line(line, line_no, &mut map)?,
            _ => {}
        }
    }

    Ok(map)
}

/// Parse only the metadata header, stopping at the object section
pub fn parse_metadata(text: &str) -> Result<Metadata, MapError> {
    let mut lines = text.lines();
    check_header(lines.next().map(|l| (0, l)))?;

    let mut metadata = Metadata::new();
    let mut section = 0;
    for raw in lines {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        if line.starts_with("---") {
            section += 1;
            if section > 1 {
                break;
            }
            continue;
        }
        if section == 1 {
            if let Some((key, value)) = metadata_entry(line) {
                metadata.insert(key, value);
            }
        }
    }
    Ok(metadata)
}

fn check_header(first: Option<(usize, &str)>) -> Result<(), MapError> {
    let line = first.map(|(_, l)| l.trim()).unwrap_or_default();
    let version = line.strip_prefix("#! ").ok_or(MapError::MissingHeader)?;
    if SUPPORTED_VERSIONS.contains(&version) {
        Ok(())
    } else {
        Err(MapError::UnsupportedVersion(version.to_string()))
    }
}

fn metadata_entry(line: &str) -> Option<(String, Value)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim().to_string(), literal(value.trim())))
}

/// `true`/`false`, `"quoted"`, numbers (including `0x` hex); anything else
/// stays a raw string
pub fn literal(token: &str) -> Value {
    match token {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if let Some(rest) = token.strip_prefix('"') {
        let end = rest.rfind('"').unwrap_or(rest.len());
        return Value::String(rest[..end].to_string());
    }

    match parse_number(token).and_then(Number::from_f64) {
        Some(n) => Value::Number(n),
        None => Value::String(token.to_string()),
    }
}

fn parse_number(token: &str) -> Option<f64> {
    if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|v| v as f64);
    }
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Collects `--key value` pairs
fn options(items: &[&str]) -> Options {
    let mut options = Options::new();
    for (i, item) in items.iter().enumerate() {
        if let Some(key) = item.strip_prefix("--") {
            let value = items.get(i + 1).map(|v| literal(v)).unwrap_or(Value::Null);
            options.insert(key.to_string(), value);
        }
    }
    options
}

fn parse_object_line(line: &str, line_no: usize, map: &mut GameMap) -> Result<(), MapError> {
    let items: Vec<&str> = line.split_whitespace().collect();
    let Some(&directive) = items.first() else {
        return Ok(());
    };
    let num = |idx: usize| number_at(&items, idx, line_no, directive);

    match directive {
        "Spawn" => {
            let yaw_deg = match items.get(4) {
                Some(token) if !token.starts_with("--") => num(4)?,
                _ => 0.0,
            };
            map.spawn_points.push(SpawnPoint {
                position: Vec3::new(num(1)?, num(2)?, num(3)?),
                yaw: yaw_deg.to_radians(),
            });
        }
        "Wall" => map.objects.push(MapObject::Wall {
            position: Vec2::new(num(1)?, num(2)?),
            size: Vec2::new(num(3)?, num(4)?),
            options: options(&items),
        }),
        "Box" => map.objects.push(MapObject::Box {
            position: Vec3::new(num(1)?, num(2)?, num(3)?),
            size: Vec3::new(num(4)?, num(5)?, num(6)?),
            options: options(&items),
        }),
        "Ramp" => {
            let token = items.get(7).ok_or(MapError::MissingField {
                line: line_no,
                directive: "Ramp",
            })?;
            let orientation = token
                .trim_matches('"')
                .parse::<RampOrientation>()
                .map_err(|_| MapError::InvalidValue {
                    line: line_no,
                    token: token.to_string(),
                })?;
            map.objects.push(MapObject::Ramp {
                position: Vec3::new(num(1)?, num(2)?, num(3)?),
                size: Vec3::new(num(4)?, num(5)?, num(6)?),
                orientation,
                options: options(&items),
            });
        }
        "PowerUp" => {
            let opts = options(&items);
            let kind = match opts.get("type") {
                None => PowerUpKind::default(),
                Some(Value::String(s)) => s.parse().map_err(|_| MapError::InvalidValue {
                    line: line_no,
                    token: s.clone(),
                })?,
                Some(other) => {
                    return Err(MapError::InvalidValue {
                        line: line_no,
                        token: other.to_string(),
                    })
                }
            };
            map.power_ups.push(PowerUpSpawn {
                position: Vec3::new(num(1)?, num(2)?, num(3)?),
                kind,
            });
        }
        // Presentation-only directives (Sky, Sun, Ambience) and anything unknown
        _ => {}
    }

    Ok(())
}

fn number_at(items: &[&str], idx: usize, line: usize, directive: &str) -> Result<f32, MapError> {
    let token = items.get(idx).ok_or_else(|| MapError::MissingField {
        line,
        directive: static_directive(directive),
    })?;
    parse_number(token)
        .map(|v| v as f32)
        .ok_or_else(|| MapError::InvalidValue {
            line,
            token: token.to_string(),
        })
}

fn static_directive(directive: &str) -> &'static str {
    match directive {
        "Spawn" => "Spawn",
        "Wall" => "Wall",
        "Box" => "Box",
        "Ramp" => "Ramp",
        "PowerUp" => "PowerUp",
        _ => "object",
    }
}
