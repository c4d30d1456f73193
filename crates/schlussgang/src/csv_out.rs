use std::io::Write;
use std::path::Path;

use crate::types::ResultSet;

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Writes the header and one row per record to any writer.
pub fn write_records<W: Write>(results: &ResultSet, out: W) -> Result<(), PersistError> {
    let columns = results.columns();
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&columns)?;
    for row in results.rows(&columns) {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    log::debug!("CSV columns: {:?}", columns);
    Ok(())
}

/// Overwrites `path` with the result set as UTF-8 CSV.
///
/// An empty result set leaves `path` untouched and returns `Ok(false)`.
pub fn write_csv(results: &ResultSet, path: impl AsRef<Path>) -> Result<bool, PersistError> {
    let path = path.as_ref();
    if results.is_empty() {
        log::warn!("No data to save");
        return Ok(false);
    }

    let file = std::fs::File::create(path)?;
    write_records(results, file)?;
    log::info!("Data saved to {}", path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubjectRecord;
    use std::fs;

    fn sample() -> ResultSet {
        let mut giger = SubjectRecord::new("Samuel Giger");
        giger.insert("Wohnort", "Ottoberg");
        giger.insert("Grösse (cm)", "193");
        let mut wicki = SubjectRecord::new("Joel Wicki");
        wicki.insert("Wohnort", "Sörenberg");
        wicki.insert("Hobbys", "Jagd, Fischen");
        vec![giger, wicki].into_iter().collect()
    }

    #[test]
    fn test_write_csv_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portraits.csv");

        assert!(write_csv(&sample(), &path).unwrap());

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Name,Grösse (cm),Hobbys,Wohnort");
        assert_eq!(lines[1], "Samuel Giger,193,,Ottoberg");
        assert_eq!(lines[2], "Joel Wicki,,\"Jagd, Fischen\",Sörenberg");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_write_csv_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portraits.csv");
        fs::write(&path, "stale,content\n1,2\n3,4\n5,6\n").unwrap();

        let single: ResultSet = vec![SubjectRecord::new("N/A")].into_iter().collect();
        assert!(write_csv(&single, &path).unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "Name\nN/A\n");
    }

    #[test]
    fn test_empty_result_set_does_not_touch_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.csv");
        assert!(!write_csv(&ResultSet::new(), &missing).unwrap());
        assert!(!missing.exists());

        let existing = dir.path().join("existing.csv");
        fs::write(&existing, "Name\nkeep me\n").unwrap();
        assert!(!write_csv(&ResultSet::new(), &existing).unwrap());
        assert_eq!(fs::read_to_string(&existing).unwrap(), "Name\nkeep me\n");
    }

    #[test]
    fn test_header_is_superset_of_every_record() {
        let results = sample();
        let mut out = Vec::new();
        write_records(&results, &mut out).unwrap();

        let mut reader = csv::Reader::from_reader(out.as_slice());
        let header: Vec<String> = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        assert_eq!(header[0], "Name");
        let mut rest = header[1..].to_vec();
        rest.sort();
        assert_eq!(rest, header[1..].to_vec());
        for record in results.iter() {
            assert!(record.keys().all(|k| header.iter().any(|h| h == k)));
        }
    }
}
