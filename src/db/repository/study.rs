use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::repository::{parse_datetime, parse_opt_uuid, parse_uuid};
use crate::db::DatabaseError;
use crate::models::{FileKind, StudyFile};

const STUDY_COLUMNS: &str =
    "id, patient_id, request_id, kind, file_name, url, storage_key, visible, uploaded_at";

pub fn insert_study(conn: &Connection, study: &StudyFile) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO study_files (id, patient_id, request_id, kind, file_name, url,
         storage_key, visible, uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            study.id.to_string(),
            study.patient_id.map(|id| id.to_string()),
            study.request_id.map(|id| id.to_string()),
            study.kind.as_str(),
            study.file_name,
            study.url,
            study.storage_key,
            study.visible as i32,
            study.uploaded_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn get_study(conn: &Connection, id: &Uuid) -> Result<StudyFile, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {STUDY_COLUMNS} FROM study_files WHERE id = ?1"),
            params![id.to_string()],
            study_row,
        )
        .optional()?;

    match row {
        Some(row) => study_from_row(row),
        None => Err(DatabaseError::not_found("StudyFile", id)),
    }
}

/// Visible files for a patient, optionally narrowed to one kind.
pub fn list_studies_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
    kind: Option<FileKind>,
) -> Result<Vec<StudyFile>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STUDY_COLUMNS} FROM study_files
         WHERE patient_id = ?1 AND visible = 1 AND (?2 IS NULL OR kind = ?2)
         ORDER BY uploaded_at DESC"
    ))?;

    let rows = stmt.query_map(
        params![patient_id.to_string(), kind.map(|k| k.as_str())],
        |row| Ok(study_row(row)),
    )?;

    let mut studies = Vec::new();
    for row in rows {
        studies.push(study_from_row(row??)?);
    }
    Ok(studies)
}

/// Visible clinical photos for a patient, both before and after kinds.
/// Lab study files never show up here.
pub fn list_photos_by_patient(
    conn: &Connection,
    patient_id: &Uuid,
) -> Result<Vec<StudyFile>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STUDY_COLUMNS} FROM study_files
         WHERE patient_id = ?1 AND visible = 1
           AND kind IN ('foto_antes', 'foto_despues')
         ORDER BY uploaded_at DESC"
    ))?;

    let rows = stmt.query_map(params![patient_id.to_string()], |row| Ok(study_row(row)))?;

    let mut studies = Vec::new();
    for row in rows {
        studies.push(study_from_row(row??)?);
    }
    Ok(studies)
}

/// Visible files attached to a lab request.
pub fn list_studies_by_request(
    conn: &Connection,
    request_id: &Uuid,
) -> Result<Vec<StudyFile>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STUDY_COLUMNS} FROM study_files
         WHERE request_id = ?1 AND visible = 1 ORDER BY uploaded_at DESC"
    ))?;

    let rows = stmt.query_map(params![request_id.to_string()], |row| Ok(study_row(row)))?;

    let mut studies = Vec::new();
    for row in rows {
        studies.push(study_from_row(row??)?);
    }
    Ok(studies)
}

/// Soft delete: the row stays, the file stays, only `visible` flips.
pub fn soft_delete_study(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE study_files SET visible = 0 WHERE id = ?1 AND visible = 1",
        params![id.to_string()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::not_found("StudyFile", id));
    }
    Ok(())
}

type StudyRow = (
    String,
    Option<String>,
    Option<String>,
    String,
    String,
    String,
    String,
    i32,
    String,
);

fn study_row(row: &rusqlite::Row<'_>) -> Result<StudyRow, rusqlite::Error> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn study_from_row(row: StudyRow) -> Result<StudyFile, DatabaseError> {
    let (id, patient_id, request_id, kind, file_name, url, storage_key, visible, uploaded_at) = row;
    Ok(StudyFile {
        id: parse_uuid(&id)?,
        patient_id: parse_opt_uuid(patient_id),
        request_id: parse_opt_uuid(request_id),
        kind: FileKind::from_str(&kind)?,
        file_name,
        url,
        storage_key,
        visible: visible != 0,
        uploaded_at: parse_datetime(&uploaded_at)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Utc;

    pub(crate) fn sample_study(
        patient_id: Option<Uuid>,
        request_id: Option<Uuid>,
        kind: FileKind,
    ) -> StudyFile {
        StudyFile {
            id: Uuid::new_v4(),
            patient_id,
            request_id,
            kind,
            file_name: "analitica.pdf".into(),
            url: "http://127.0.0.1:4000/uploads/abc.pdf".into(),
            storage_key: "abc.pdf".into(),
            visible: true,
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn kind_filter_narrows_patient_listing() {
        let conn = open_memory_database().unwrap();
        let patient = Uuid::new_v4();
        insert_study(&conn, &sample_study(Some(patient), None, FileKind::FotoAntes)).unwrap();
        insert_study(&conn, &sample_study(Some(patient), None, FileKind::FotoDespues)).unwrap();
        insert_study(&conn, &sample_study(Some(patient), None, FileKind::Estudio)).unwrap();

        let all = list_studies_by_patient(&conn, &patient, None).unwrap();
        assert_eq!(all.len(), 3);

        let before = list_studies_by_patient(&conn, &patient, Some(FileKind::FotoAntes)).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].kind, FileKind::FotoAntes);
    }

    #[test]
    fn photo_listing_excludes_lab_studies() {
        let conn = open_memory_database().unwrap();
        let patient = Uuid::new_v4();
        insert_study(&conn, &sample_study(Some(patient), None, FileKind::FotoAntes)).unwrap();
        insert_study(&conn, &sample_study(Some(patient), None, FileKind::FotoDespues)).unwrap();
        insert_study(&conn, &sample_study(Some(patient), None, FileKind::Estudio)).unwrap();

        let photos = list_photos_by_patient(&conn, &patient).unwrap();
        assert_eq!(photos.len(), 2);
        assert!(photos.iter().all(|p| p.kind != FileKind::Estudio));
    }

    #[test]
    fn soft_delete_hides_but_keeps_row() {
        let conn = open_memory_database().unwrap();
        let patient = Uuid::new_v4();
        let study = sample_study(Some(patient), None, FileKind::Estudio);
        insert_study(&conn, &study).unwrap();

        soft_delete_study(&conn, &study.id).unwrap();
        assert!(list_studies_by_patient(&conn, &patient, None)
            .unwrap()
            .is_empty());

        // Row still there, just invisible.
        let found = get_study(&conn, &study.id).unwrap();
        assert!(!found.visible);

        // Second delete targets nothing.
        let err = soft_delete_study(&conn, &study.id).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn request_listing_ignores_patient_only_files() {
        let conn = open_memory_database().unwrap();
        let request = Uuid::new_v4();
        insert_study(&conn, &sample_study(None, Some(request), FileKind::Estudio)).unwrap();
        insert_study(&conn, &sample_study(Some(Uuid::new_v4()), None, FileKind::Estudio)).unwrap();

        let files = list_studies_by_request(&conn, &request).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].request_id, Some(request));
    }
}
