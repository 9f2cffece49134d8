//! Cache files holding the shapes of one level, so that they do not have
//! to be enumerated again.
//!
//! Layout, integers little-endian:
//!
//! ```text
//! magic [CB EC C0 DE] | version u8 | symmetry u8 | compression u8 | varint n | body
//! body = varint shape_count, shape_count * (varint cube_count, cube_count * (i32 x, i32 y, i32 z))
//! ```
//!
//! `body` is compressed as a whole according to the compression byte.
//! Varints are LEB128 encoded.

use std::{
    fs::File,
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{
    enumerate::{Enumerator, ShapeSet},
    shape::{Coordinate, Shape, Symmetry},
};

mod compression;
pub use compression::Compression;

const MAGIC: [u8; 4] = [0xCB, 0xEC, 0xC0, 0xDE];

/// The version of the layout written by this module.
pub const VERSION: u8 = 1;

/// The reasons a cache file could not be used.
///
/// None of these are fatal: the shapes can always be enumerated instead.
#[derive(Debug, Error)]
pub enum CacheMiss {
    #[error("cache file does not exist")]
    NotFound,
    #[error("file magic was incorrect")]
    BadMagic,
    #[error("unsupported cache version {found}, expected {expected}")]
    UnsupportedVersion { found: u8, expected: u8 },
    #[error("unknown symmetry mode {0}")]
    UnknownSymmetry(u8),
    #[error("unsupported compression type {0}")]
    UnknownCompression(u8),
    #[error("cache file is truncated")]
    Truncated,
    #[error("cache file is corrupt: {0}")]
    Corrupt(String),
    #[error("cache file holds N = {found_n} ({found_symmetry}), expected N = {n} ({symmetry})")]
    Mismatch {
        n: usize,
        symmetry: Symmetry,
        found_n: usize,
        found_symmetry: Symmetry,
    },
    #[error("cache file could not be read: {0}")]
    Io(#[source] std::io::Error),
}

impl From<std::io::Error> for CacheMiss {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            ErrorKind::NotFound => CacheMiss::NotFound,
            ErrorKind::UnexpectedEof => CacheMiss::Truncated,
            ErrorKind::InvalidData | ErrorKind::InvalidInput => CacheMiss::Corrupt(e.to_string()),
            _ => CacheMiss::Io(e),
        }
    }
}

/// The contents of a cache file.
#[derive(Debug, Clone)]
pub struct CacheFile {
    pub n: usize,
    pub symmetry: Symmetry,
    pub compression: Compression,
    pub shapes: Vec<Shape>,
}

impl CacheFile {
    /// Turn the stored shapes into a [`ShapeSet`], checking that every
    /// shape has `n` cubes, is face-connected and normalized, and that no
    /// shape occurs twice.
    pub fn into_set(self) -> Result<ShapeSet, CacheMiss> {
        let n = self.n;
        for shape in &self.shapes {
            if shape.len() != n {
                return Err(CacheMiss::Corrupt(format!(
                    "found a shape with {} cubes in a file for N = {n}",
                    shape.len()
                )));
            }

            if !shape.is_face_connected() {
                return Err(CacheMiss::Corrupt(
                    "found a shape that is not face-connected".into(),
                ));
            }

            if !shape.is_normalized() {
                return Err(CacheMiss::Corrupt(
                    "found a shape that is not normalized".into(),
                ));
            }
        }

        let (set, duplicates) = ShapeSet::from_shapes(n, self.symmetry, self.shapes);
        if duplicates > 0 {
            return Err(CacheMiss::Corrupt(format!(
                "found {duplicates} duplicate shapes"
            )));
        }

        Ok(set)
    }
}

fn write_varint<W: Write>(write: &mut W, mut value: u64) -> std::io::Result<()> {
    loop {
        let mut next_byte = (value as u8) & 0x7F;
        value >>= 7;

        if value > 0 {
            next_byte |= 0x80;
        }

        write.write_all(&[next_byte])?;

        if value == 0 {
            return Ok(());
        }
    }
}

fn read_varint<R: Read>(read: &mut R) -> Result<u64, CacheMiss> {
    let mut value: u64 = 0;
    let mut shift = 0;
    loop {
        let mut next_byte = [0u8; 1];
        read.read_exact(&mut next_byte)?;

        let [next_byte] = next_byte;

        if shift > 63 {
            return Err(CacheMiss::Corrupt("varint does not fit in 64 bits".into()));
        }
        value |= ((next_byte & 0x7F) as u64) << shift;
        shift += 7;

        if next_byte & 0x80 == 0 {
            return Ok(value);
        }
    }
}

fn read_usize<R: Read>(read: &mut R) -> Result<usize, CacheMiss> {
    let value = read_varint(read)?;
    usize::try_from(value).map_err(|_| CacheMiss::Corrupt(format!("length {value} is too large")))
}

fn read_i32<R: Read>(read: &mut R) -> Result<i32, CacheMiss> {
    let mut bytes = [0u8; 4];
    read.read_exact(&mut bytes)?;
    Ok(i32::from_le_bytes(bytes))
}

/// Serialize `shapes` into `write`.
pub fn write<'a, I, W>(
    n: usize,
    symmetry: Symmetry,
    compression: Compression,
    shapes: I,
    mut write: W,
) -> std::io::Result<W>
where
    I: IntoIterator<Item = &'a Shape>,
    I::IntoIter: ExactSizeIterator,
    W: Write,
{
    let shapes = shapes.into_iter();

    write.write_all(&MAGIC)?;
    write.write_all(&[VERSION, symmetry.into(), compression.into()])?;
    write_varint(&mut write, n as u64)?;

    let mut body = compression.writer(write);
    write_varint(&mut body, shapes.len() as u64)?;

    for shape in shapes {
        write_varint(&mut body, shape.len() as u64)?;
        for c in shape.cubes() {
            body.write_all(&c.x.to_le_bytes())?;
            body.write_all(&c.y.to_le_bytes())?;
            body.write_all(&c.z.to_le_bytes())?;
        }
    }

    body.finish()
}

/// Deserialize a cache file from `read`.
pub fn read<R: Read>(mut read: R) -> Result<CacheFile, CacheMiss> {
    let mut magic = [0u8; 4];
    read.read_exact(&mut magic)?;

    if magic != MAGIC {
        return Err(CacheMiss::BadMagic);
    }

    let mut header = [0u8; 3];
    read.read_exact(&mut header)?;
    let [version, symmetry, compression] = header;

    if version != VERSION {
        return Err(CacheMiss::UnsupportedVersion {
            found: version,
            expected: VERSION,
        });
    }

    let symmetry =
        Symmetry::try_from(symmetry).map_err(|_| CacheMiss::UnknownSymmetry(symmetry))?;
    let compression = Compression::try_from(compression)
        .map_err(|_| CacheMiss::UnknownCompression(compression))?;
    let n = read_usize(&mut read)?;

    let mut body = compression.reader(read);
    let count = read_usize(&mut body)?;

    // The count is untrusted, so don't reserve more than a sane amount up front.
    let mut shapes = Vec::with_capacity(count.min(1 << 16));
    for _ in 0..count {
        let len = read_usize(&mut body)?;

        // Stored shapes are normalized, so every coordinate lies in `0..len`.
        let bound = i32::try_from(len)
            .map_err(|_| CacheMiss::Corrupt(format!("shape length {len} is too large")))?;
        let in_bounds = |v: i32| (0..bound).contains(&v);

        let mut cubes = Vec::with_capacity(len.min(1 << 10));
        for _ in 0..len {
            let x = read_i32(&mut body)?;
            let y = read_i32(&mut body)?;
            let z = read_i32(&mut body)?;

            if !(in_bounds(x) && in_bounds(y) && in_bounds(z)) {
                return Err(CacheMiss::Corrupt(format!(
                    "coordinate ({x}, {y}, {z}) is out of range for a shape of {len} cubes"
                )));
            }
            cubes.push(Coordinate::new(x, y, z));
        }

        let shape = Shape::try_new(cubes)
            .ok_or_else(|| CacheMiss::Corrupt("shape contains duplicate coordinates".into()))?;
        shapes.push(shape);
    }

    let mut trailing = [0u8; 1];
    if body.read(&mut trailing)? != 0 {
        return Err(CacheMiss::Corrupt("trailing data after last shape".into()));
    }

    Ok(CacheFile {
        n,
        symmetry,
        compression,
        shapes,
    })
}

/// Write `set` to the file at `path` using gzip compression.
pub fn save(set: &ShapeSet, path: impl AsRef<Path>) -> std::io::Result<()> {
    save_with(set, Compression::Gzip, path)
}

/// Write `set` to the file at `path`.
///
/// The data is first written to a hidden temporary file next to `path`,
/// which then replaces `path`. The parent directory of `path` must exist.
/// Shapes are written ordered by canonical key.
pub fn save_with(
    set: &ShapeSet,
    compression: Compression,
    path: impl AsRef<Path>,
) -> std::io::Result<()> {
    let path = path.as_ref();
    let temp = temp_path(path)?;

    let result = File::create(&temp).and_then(|file| {
        let file = write(set.n(), set.symmetry(), compression, set.sorted(), file)?;
        file.sync_all()
    });

    match result.and_then(|_| std::fs::rename(&temp, path)) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = std::fs::remove_file(&temp);
            Err(e)
        }
    }
}

fn temp_path(path: &Path) -> std::io::Result<PathBuf> {
    let filename = path.file_name().ok_or_else(|| {
        std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("{} is not a file path", path.display()),
        )
    })?;
    let filename = format!(".{}.tmp", filename.to_string_lossy());

    let mut temp = path.to_path_buf();
    temp.set_file_name(filename);
    Ok(temp)
}

/// Read the cache file at `path`.
pub fn load(path: impl AsRef<Path>) -> Result<CacheFile, CacheMiss> {
    let file = File::open(path.as_ref())?;
    read(file)
}

/// Read the cache file at `path`, and check that it holds a complete set
/// of shapes of size `n` under `symmetry`.
pub fn load_set(
    path: impl AsRef<Path>,
    n: usize,
    symmetry: Symmetry,
) -> Result<ShapeSet, CacheMiss> {
    let file = load(path)?;

    if file.n != n || file.symmetry != symmetry {
        return Err(CacheMiss::Mismatch {
            n,
            symmetry,
            found_n: file.n,
            found_symmetry: file.symmetry,
        });
    }

    file.into_set()
}

/// The path of the cache file for shapes of size `n` under `symmetry` in `dir`.
pub fn cache_path(dir: impl AsRef<Path>, n: usize, symmetry: Symmetry) -> PathBuf {
    dir.as_ref().join(format!("cubes_{n}_{symmetry}.pcache"))
}

/// Find the largest level `<= n` that has a usable cache file in `dir`.
fn load_largest(dir: &Path, n: usize, symmetry: Symmetry) -> Option<ShapeSet> {
    for m in (3..=n).rev() {
        let path = cache_path(dir, m, symmetry);

        match load_set(&path, m, symmetry) {
            Ok(set) => {
                log::info!("Found cache for N = {m} at {}", path.display());
                return Some(set);
            }
            Err(CacheMiss::NotFound) => {}
            Err(e) => log::warn!("Ignoring cache file {}: {e}", path.display()),
        }
    }

    log::info!("No cache file found for N <= {n}");
    None
}

/// All unique shapes of `n` cubes, reusing the cache files in `dir`.
///
/// Enumeration resumes from the largest cached level `<= n`, and every
/// level computed on the way is written to `dir`. Unusable cache files
/// are ignored and failures to write new ones are logged, so this always
/// returns the complete set.
pub fn generate_cached(
    enumerator: &Enumerator,
    n: usize,
    dir: impl AsRef<Path>,
    compression: Compression,
) -> ShapeSet {
    let dir = dir.as_ref();
    let symmetry = enumerator.symmetry();

    if n <= 2 {
        return enumerator.generate(n);
    }

    let mut current = match load_largest(dir, n, symmetry) {
        Some(set) => set,
        None => enumerator.generate(2),
    };

    while current.n() < n {
        current = enumerator.expand_level(&current);

        let path = cache_path(dir, current.n(), symmetry);
        log::info!("Saving {} shapes to {}", current.len(), path.display());
        if let Err(e) = save_with(&current, compression, &path) {
            log::warn!("Failed to write cache file {}: {e}", path.display());
        }
    }

    current
}

#[cfg(test)]
mod test {
    use std::{
        collections::HashSet,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::shape::CanonicalKey;

    fn temp_dir(name: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);

        let dir = std::env::temp_dir().join(format!(
            "polycubes-cache-{}-{name}-{id}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn keys(set: &ShapeSet) -> HashSet<CanonicalKey> {
        set.keys().cloned().collect()
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = temp_dir("roundtrip");
        let set = Enumerator::new().generate(5);

        for compression in [Compression::None, Compression::Gzip] {
            let path = dir.join(format!("{compression:?}.pcache"));
            save_with(&set, compression, &path).unwrap();

            let file = load(&path).unwrap();
            assert_eq!(file.n, 5);
            assert_eq!(file.symmetry, Symmetry::Translation);
            assert_eq!(file.compression, compression);

            let loaded = file.into_set().unwrap();
            assert_eq!(loaded, set);
        }

        // No temporary files are left behind.
        let names: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert!(names.iter().all(|n| !n.ends_with(".tmp")), "{names:?}");
    }

    #[test]
    fn gzip_is_smaller() {
        let set = Enumerator::new().generate(5);
        let plain = write(5, set.symmetry(), Compression::None, set.iter(), Vec::new()).unwrap();
        let gzip = write(5, set.symmetry(), Compression::Gzip, set.iter(), Vec::new()).unwrap();
        assert!(gzip.len() < plain.len());
    }

    #[test]
    fn missing_file() {
        let dir = temp_dir("missing");
        let result = load(dir.join("nothing-here.pcache"));
        assert!(matches!(result, Err(CacheMiss::NotFound)));
    }

    #[test]
    fn bad_magic() {
        let result = read(&b"not a cache file"[..]);
        assert!(matches!(result, Err(CacheMiss::BadMagic)));
    }

    #[test]
    fn unsupported_version() {
        let set = Enumerator::new().generate(3);
        let mut bytes = write(3, set.symmetry(), Compression::None, set.iter(), Vec::new()).unwrap();
        bytes[4] = VERSION + 1;

        let result = read(&bytes[..]);
        assert!(matches!(
            result,
            Err(CacheMiss::UnsupportedVersion { found, .. }) if found == VERSION + 1
        ));
    }

    #[test]
    fn unknown_header_values() {
        let set = Enumerator::new().generate(3);
        let bytes = write(3, set.symmetry(), Compression::None, set.iter(), Vec::new()).unwrap();

        let mut bad_symmetry = bytes.clone();
        bad_symmetry[5] = 9;
        assert!(matches!(read(&bad_symmetry[..]), Err(CacheMiss::UnknownSymmetry(9))));

        let mut bad_compression = bytes;
        bad_compression[6] = 7;
        assert!(matches!(
            read(&bad_compression[..]),
            Err(CacheMiss::UnknownCompression(7))
        ));
    }

    #[test]
    fn truncated() {
        let set = Enumerator::new().generate(4);

        let bytes = write(4, set.symmetry(), Compression::None, set.iter(), Vec::new()).unwrap();
        let result = read(&bytes[..bytes.len() - 5]);
        assert!(matches!(result, Err(CacheMiss::Truncated)), "{result:?}");

        let bytes = write(4, set.symmetry(), Compression::Gzip, set.iter(), Vec::new()).unwrap();
        let result = read(&bytes[..bytes.len() / 2]);
        assert!(
            matches!(result, Err(CacheMiss::Truncated | CacheMiss::Corrupt(_))),
            "{result:?}"
        );
    }

    #[test]
    fn trailing_data() {
        let set = Enumerator::new().generate(3);
        let mut bytes = write(3, set.symmetry(), Compression::None, set.iter(), Vec::new()).unwrap();
        bytes.push(0);
        assert!(matches!(read(&bytes[..]), Err(CacheMiss::Corrupt(_))));
    }

    #[test]
    fn duplicate_shapes_are_corrupt() {
        let shapes = [Shape::domino(), Shape::from(vec![(1, 0, 0), (0, 0, 0)])];
        let bytes = write(2, Symmetry::Translation, Compression::None, &shapes, Vec::new()).unwrap();

        let file = read(&bytes[..]).unwrap();
        assert_eq!(file.shapes.len(), 2);
        assert!(matches!(file.into_set(), Err(CacheMiss::Corrupt(_))));
    }

    #[test]
    fn load_set_checks_level() {
        let dir = temp_dir("mismatch");
        let path = dir.join("four.pcache");
        save(&Enumerator::new().generate(4), &path).unwrap();

        assert!(load_set(&path, 4, Symmetry::Translation).is_ok());
        assert!(matches!(
            load_set(&path, 5, Symmetry::Translation),
            Err(CacheMiss::Mismatch { found_n: 4, .. })
        ));
        assert!(matches!(
            load_set(&path, 4, Symmetry::Rotation),
            Err(CacheMiss::Mismatch { .. })
        ));
    }

    #[test]
    fn generate_cached_writes_and_resumes() {
        let dir = temp_dir("resume");
        let enumerator = Enumerator::new().with_symmetry(Symmetry::Rotation);

        let first = generate_cached(&enumerator, 5, &dir, Compression::Gzip);
        assert_eq!(first.len(), 29);
        for m in 3..=5 {
            assert!(cache_path(&dir, m, Symmetry::Rotation).exists(), "N = {m}");
        }

        // Resuming from the level 5 file.
        let second = generate_cached(&enumerator, 6, &dir, Compression::Gzip);
        assert_eq!(second.len(), 166);
        assert_eq!(keys(&second), keys(&enumerator.generate(6)));

        // A cache hit returns the stored set as-is.
        let third = generate_cached(&enumerator, 6, &dir, Compression::Gzip);
        assert_eq!(keys(&third), keys(&second));
    }

    #[test]
    fn generate_cached_recovers_from_corrupt_files() {
        let dir = temp_dir("corrupt");
        let enumerator = Enumerator::new();

        std::fs::write(cache_path(&dir, 4, Symmetry::Translation), b"garbage").unwrap();

        let set = generate_cached(&enumerator, 4, &dir, Compression::None);
        assert_eq!(set.len(), 67);

        // The broken file was replaced with a valid one.
        let reloaded = load_set(cache_path(&dir, 4, Symmetry::Translation), 4, Symmetry::Translation)
            .unwrap();
        assert_eq!(keys(&reloaded), keys(&set));
    }

    #[test]
    fn out_of_range_coordinates_are_corrupt() {
        let shapes = [Shape::from(vec![(i32::MIN, 0, 0), (i32::MAX, 0, 0)])];
        let bytes = write(2, Symmetry::Translation, Compression::None, &shapes, Vec::new()).unwrap();
        assert!(matches!(read(&bytes[..]), Err(CacheMiss::Corrupt(_))));

        let shapes = [Shape::from(vec![(0, 0, 0), (0, -1, 0)])];
        let bytes = write(2, Symmetry::Translation, Compression::Gzip, &shapes, Vec::new()).unwrap();
        assert!(matches!(read(&bytes[..]), Err(CacheMiss::Corrupt(_))));
    }

    #[test]
    fn invalid_shapes_are_corrupt() {
        let disconnected = [Shape::from(vec![(0, 0, 0), (2, 0, 0), (0, 2, 0)])];
        let bytes = write(3, Symmetry::Translation, Compression::None, &disconnected, Vec::new())
            .unwrap();
        assert!(matches!(
            read(&bytes[..]).unwrap().into_set(),
            Err(CacheMiss::Corrupt(_))
        ));

        let shifted = [Shape::from(vec![(1, 0, 0), (2, 0, 0), (1, 1, 0)])];
        let bytes =
            write(3, Symmetry::Translation, Compression::None, &shifted, Vec::new()).unwrap();
        assert!(matches!(
            read(&bytes[..]).unwrap().into_set(),
            Err(CacheMiss::Corrupt(_))
        ));
    }

    #[test]
    fn generate_cached_recovers_from_invalid_shapes() {
        let dir = temp_dir("invalid-shapes");
        let enumerator = Enumerator::new();
        let path = cache_path(&dir, 3, Symmetry::Translation);

        // A well-formed file for N = 3 holding a disconnected shape and a
        // single valid one, so the level is neither valid nor complete.
        let shapes = [
            Shape::from(vec![(0, 0, 0), (1, 0, 0), (0, 2, 0)]),
            Shape::from(vec![(0, 0, 0), (1, 0, 0), (2, 0, 0)]),
        ];
        let file = File::create(&path).unwrap();
        write(3, Symmetry::Translation, Compression::Gzip, &shapes, file).unwrap();
        assert!(load_set(&path, 3, Symmetry::Translation).is_err());

        let set = generate_cached(&enumerator, 4, &dir, Compression::Gzip);
        assert_eq!(set.len(), 67);

        let reloaded = load_set(&path, 3, Symmetry::Translation).unwrap();
        assert_eq!(reloaded.len(), 9);
    }

    #[test]
    fn cache_path_names() {
        let path = cache_path("/tmp/cubes", 7, Symmetry::RotationReflection);
        assert_eq!(
            path,
            PathBuf::from("/tmp/cubes/cubes_7_rotation-reflection.pcache")
        );
    }
}
