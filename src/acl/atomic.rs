use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

/// Новый файл без прав-источника получает `rw-r--r--`, чтобы брокер мог его прочитать.
#[cfg(unix)]
const DEFAULT_MODE: u32 = 0o644;

/// Полностью записанное и сброшенное на диск содержимое, ожидающее
/// переименования поверх `target`.
///
/// Если значение уничтожается без [`StagedFile::commit`], временный файл
/// удаляется, а целевой файл остаётся нетронутым.
#[derive(Debug)]
pub struct StagedFile {
    target: PathBuf,
    tmp: NamedTempFile,
}

/// Пишет `content` во временный файл в том же каталоге, что и `target`.
///
/// Права существующего файла переносятся на временный, так что замена их не
/// меняет.
pub fn stage(
    target: &Path,
    content: &[u8],
) -> io::Result<StagedFile> {
    let dir = parent_dir(target);
    let mut tmp = tempfile::Builder::new()
        .prefix(".aclsync-")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    tmp.write_all(content)?;
    tmp.flush()?;
    copy_permissions(target, tmp.as_file())?;
    tmp.as_file().sync_all()?;

    Ok(StagedFile {
        target: target.to_path_buf(),
        tmp,
    })
}

/// Атомарная замена: stage + commit.
pub fn replace(
    target: &Path,
    content: &[u8],
) -> io::Result<()> {
    stage(target, content)?.commit()
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        self.tmp.path()
    }

    /// Переименовывает временный файл поверх целевого и сбрасывает каталог.
    pub fn commit(self) -> io::Result<()> {
        let StagedFile { target, tmp } = self;
        tmp.persist(&target).map_err(|e| e.error)?;
        sync_dir(parent_dir(&target))
    }
}

fn parent_dir(target: &Path) -> &Path {
    match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

fn copy_permissions(
    target: &Path,
    file: &fs::File,
) -> io::Result<()> {
    match fs::metadata(target) {
        Ok(meta) => file.set_permissions(meta.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => set_default_permissions(file),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn set_default_permissions(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(DEFAULT_MODE))
}

#[cfg(not(unix))]
fn set_default_permissions(_file: &fs::File) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_creates_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mosquitto.acl");

        replace(&path, b"user a\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "user a\n");

        replace(&path, b"user b\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "user b\n");
    }

    /// Тест проверяет, что без commit временный файл удаляется, а цель не меняется.
    #[test]
    fn test_dropped_stage_leaves_target_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mosquitto.acl");
        fs::write(&path, "user a\n").unwrap();

        let staged = stage(&path, b"user b\n").unwrap();
        let tmp_path = staged.path().to_path_buf();
        assert!(tmp_path.exists());
        drop(staged);

        assert!(!tmp_path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "user a\n");
    }

    /// Имитация падения процесса между записью и переименованием: на диске
    /// остаётся временный файл, но целевой файл содержит прежнюю версию.
    #[test]
    fn test_crash_before_rename_keeps_old_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mosquitto.acl");
        fs::write(&path, "\nuser a\ntopic read x\n").unwrap();

        let staged = stage(&path, b"\nuser a\ntopic write x\n").unwrap();
        let (_file, orphan) = staged.tmp.keep().unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "\nuser a\ntopic read x\n"
        );
        assert_eq!(
            fs::read_to_string(&orphan).unwrap(),
            "\nuser a\ntopic write x\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_preserved_and_defaulted() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();

        let fresh = dir.path().join("fresh.acl");
        replace(&fresh, b"").unwrap();
        let mode = fs::metadata(&fresh).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, DEFAULT_MODE);

        let existing = dir.path().join("existing.acl");
        fs::write(&existing, "x").unwrap();
        fs::set_permissions(&existing, fs::Permissions::from_mode(0o640)).unwrap();
        replace(&existing, b"y").unwrap();
        let mode = fs::metadata(&existing).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }

    #[test]
    fn test_parent_dir_of_bare_file_name() {
        assert_eq!(parent_dir(Path::new("mosquitto.acl")), Path::new("."));
        assert_eq!(parent_dir(Path::new("/etc/m/acl")), Path::new("/etc/m"));
    }
}
