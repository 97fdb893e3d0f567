use std::fs;
use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::prelude::{CoreError, CoreResult};

/// Key-file group holding the exclusion polygons.
pub const CONTOURS_GROUP: &str = "contours";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Named exclusion polygon in reference-resolution pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub name: String,
    pub points: Vec<Point>,
}

/// Every exclusion polygon configured for one stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneSet {
    pub polygons: Vec<Polygon>,
}

impl ZoneSet {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::parse(&contents)
    }

    /// Parses a key file; only the `[contours]` group is read.
    pub fn parse(contents: &str) -> CoreResult<Self> {
        let mut group: Option<&str> = None;
        let mut saw_group = false;
        let mut polygons = Vec::new();

        for (idx, raw) in contents.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| CoreError::ZoneParse {
                    line: line_no,
                    message: format!("unterminated group header `{}`", line),
                })?;
                group = Some(name.trim());
                saw_group |= name.trim() == CONTOURS_GROUP;
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| CoreError::ZoneParse {
                line: line_no,
                message: format!("expected `key=value`, found `{}`", line),
            })?;
            match group {
                Some(CONTOURS_GROUP) => {}
                Some(_) => continue,
                None => {
                    return Err(CoreError::ZoneParse {
                        line: line_no,
                        message: "key outside of any group".into(),
                    })
                }
            }

            let points = parse_points(value).map_err(|message| CoreError::ZoneParse {
                line: line_no,
                message: format!("polygon `{}`: {}", key.trim(), message),
            })?;
            polygons.push(Polygon {
                name: key.trim().to_string(),
                points,
            });
        }

        if !saw_group {
            warn!(
                target: "incidentcore::zone",
                "zone file has no [{}] group, no exclusion zones loaded", CONTOURS_GROUP
            );
        }
        Ok(Self { polygons })
    }
}

/// Parses `x1,y1;x2,y2;...`; a trailing separator is tolerated.
pub fn parse_points(value: &str) -> Result<Vec<Point>, String> {
    let mut points = Vec::new();
    for pair in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (x, y) = pair
            .split_once(',')
            .ok_or_else(|| format!("point `{}` is not `x,y`", pair))?;
        let x = x
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("bad x in `{}`: {}", pair, e))?;
        let y = y
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("bad y in `{}`: {}", pair, e))?;
        points.push(Point::new(x, y));
    }
    if points.is_empty() {
        return Err("no points".into());
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parse_reads_only_contours_group() {
        let zones = ZoneSet::parse(
            concat!(
                "# exclusion zones\n; legacy comment\n[other]\nfoo=bar\n",
                "[contours]\ndriveway=0,0;10,0;10,10;0,10\nporch = 5,5; 6,6 ;7,5;\n",
            ),
        )
        .unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones.polygons[0].name, "driveway");
        assert_eq!(zones.polygons[1].points[2], Point::new(7, 5));
    }

    #[test]
    fn parse_rejects_bad_point() {
        let err = ZoneSet::parse("[contours]\na=1,2;x,3\n").unwrap_err();
        assert!(matches!(err, CoreError::ZoneParse { line: 2, .. }));
    }

    #[test]
    fn missing_group_yields_empty_set() {
        let zones = ZoneSet::parse("[tracker]\nwidth=640\n").unwrap();
        assert!(zones.is_empty());
    }

    #[test]
    fn load_reads_file() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"[contours]\nfull=0,0;639,0;639,359;0,359\n")
            .unwrap();
        let zones = ZoneSet::load(temp.path()).unwrap();
        assert_eq!(zones.polygons[0].points.len(), 4);
    }
}
