// src/services/storage.rs

use std::{
    io::{self, ErrorKind},
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::common::error::AppError;

// Onde os bytes dos anexos ficam guardados. Os caminhos são relativos à raiz do storage.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Grava o arquivo e devolve o caminho relativo efetivamente usado.
    async fn save(&self, enquiry_id: Uuid, file_name: &str, bytes: &[u8]) -> Result<String, AppError>;

    async fn read(&self, path: &str) -> Result<Vec<u8>, AppError>;

    /// Arquivo inexistente não é erro.
    async fn delete(&self, path: &str) -> Result<(), AppError>;
}

// Limite em bytes do nome gravado em disco (o sistema de arquivos aceita 255)
const STORED_NAME_MAX_BYTES: usize = 200;

/// Reduz o nome enviado a um basename seguro.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        truncate_name(cleaned)
    }
}

// Corta o radical em fronteira de caractere, preservando a extensão
fn truncate_name(name: &str) -> String {
    if name.len() <= STORED_NAME_MAX_BYTES {
        return name.to_string();
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && ext.len() <= 16 => (stem, Some(ext)),
        _ => (name, None),
    };

    let budget = STORED_NAME_MAX_BYTES - ext.map_or(0, |e| e.len() + 1);
    let mut cut = budget.min(stem.len());
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }

    let stem = match stem[..cut].trim_end() {
        "" => "file",
        s => s,
    };
    match ext {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}

// "nome.pdf" -> "nome_1.pdf", "nome_2.pdf", ...
fn with_suffix(file_name: &str, n: u32) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{n}.{ext}"),
        _ => format!("{file_name}_{n}"),
    }
}

#[derive(Debug, Clone)]
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    // Caminhos vindos do banco nunca podem sair da raiz
    fn resolve(&self, relative: &str) -> Result<PathBuf, AppError> {
        let rel = Path::new(relative);
        let safe = rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe || relative.is_empty() {
            return Err(AppError::StorageError(io::Error::new(
                ErrorKind::InvalidInput,
                format!("caminho inválido: {relative}"),
            )));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn save(&self, enquiry_id: Uuid, file_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        let dir = format!("enquiries/{enquiry_id}");
        fs::create_dir_all(self.root.join(&dir)).await?;

        let base = sanitize_filename(file_name);
        let mut attempt = 0u32;
        loop {
            let candidate = if attempt == 0 { base.clone() } else { with_suffix(&base, attempt) };
            let relative = format!("{dir}/{candidate}");

            // create_new garante que nunca sobrescrevemos um anexo existente
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.resolve(&relative)?)
                .await
            {
                Ok(mut file) => {
                    file.write_all(bytes).await?;
                    file.flush().await?;
                    return Ok(relative);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, AppError> {
        match fs::read(self.resolve(path)?).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound("Arquivo")),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<(), AppError> {
        match fs::remove_file(self.resolve(path)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Remoção best-effort depois do commit: falhas só geram aviso.
pub async fn remove_files(storage: &dyn FileStorage, paths: &[String]) {
    for path in paths {
        if let Err(e) = storage.delete(path).await {
            tracing::warn!("Falha ao remover o arquivo '{}': {}", path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filenames_are_reduced_to_a_safe_basename() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\bob\\quote v2.pdf"), "quote v2.pdf");
        assert_eq!(sanitize_filename("..hidden"), "hidden");
        assert_eq!(sanitize_filename("a;b|c.txt"), "a_b_c.txt");
        assert_eq!(sanitize_filename(""), "file");
        assert_eq!(sanitize_filename("dir/"), "file");
        assert_eq!(sanitize_filename("報價單.xlsx"), "報價單.xlsx");
    }

    #[test]
    fn long_names_are_cut_on_a_char_boundary() {
        let name = sanitize_filename(&format!("{}.pdf", "報".repeat(100)));
        assert!(name.len() <= STORED_NAME_MAX_BYTES);
        assert!(name.ends_with(".pdf"));
        // 3 bytes por caractere: 196 bytes de radical cabem 65 caracteres
        assert_eq!(name, format!("{}.pdf", "報".repeat(65)));

        let ascii = sanitize_filename(&format!("{}.dxf", "a".repeat(256)));
        assert_eq!(ascii.len(), STORED_NAME_MAX_BYTES);
        assert!(ascii.ends_with(".dxf"));

        let no_ext = sanitize_filename(&"b".repeat(300));
        assert_eq!(no_ext, "b".repeat(STORED_NAME_MAX_BYTES));

        assert_eq!(sanitize_filename("short.txt"), "short.txt");
    }

    #[tokio::test]
    async fn long_names_are_saved_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());
        let enquiry_id = Uuid::new_v4();
        let name = format!("{}.pdf", "報".repeat(100));

        let first = storage.save(enquiry_id, &name, b"x").await.unwrap();
        let second = storage.save(enquiry_id, &name, b"y").await.unwrap();

        assert_ne!(first, second);
        assert_eq!(storage.read(&first).await.unwrap(), b"x");
        assert_eq!(storage.read(&second).await.unwrap(), b"y");
    }

    #[test]
    fn suffix_goes_before_the_extension() {
        assert_eq!(with_suffix("quote.pdf", 1), "quote_1.pdf");
        assert_eq!(with_suffix("README", 2), "README_2");
    }

    #[tokio::test]
    async fn save_read_and_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());
        let enquiry_id = Uuid::new_v4();

        let path = storage.save(enquiry_id, "drawing.dxf", b"0\nSECTION").await.unwrap();
        assert_eq!(path, format!("enquiries/{enquiry_id}/drawing.dxf"));
        assert_eq!(storage.read(&path).await.unwrap(), b"0\nSECTION");

        storage.delete(&path).await.unwrap();
        assert!(matches!(storage.read(&path).await, Err(AppError::NotFound(_))));
        // Segunda remoção é silenciosa
        storage.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn colliding_names_get_a_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());
        let enquiry_id = Uuid::new_v4();

        let first = storage.save(enquiry_id, "spec.pdf", b"v1").await.unwrap();
        let second = storage.save(enquiry_id, "spec.pdf", b"v2").await.unwrap();

        assert_ne!(first, second);
        assert!(second.ends_with("spec_1.pdf"));
        assert_eq!(storage.read(&first).await.unwrap(), b"v1");
        assert_eq!(storage.read(&second).await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn paths_outside_the_root_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path());

        assert!(matches!(storage.read("../secret").await, Err(AppError::StorageError(_))));
        assert!(matches!(storage.delete("/etc/passwd").await, Err(AppError::StorageError(_))));
    }
}
