//! # Binary Scene Cache
//!
//! A version-locked binary serialization of scene geometry and materials for
//! fast reload. Primitive arrays are written as raw little-endian machine
//! bytes so saving and loading large circuit models is bounded by disk speed,
//! not by per-element encoding.
//!
//! ## Layout
//!
//! `[version][model count]`, then per model: source path, material records,
//! and per-material groups of spheres, cylinders, cones and triangle meshes.
//! Every count, length and id is a `u64`; booleans are one byte. Streamlines,
//! SDF geometry, curves and volumes are not cached; models carrying only
//! those kinds reload empty and are skipped at insert time.
//!
//! A file written under any other [`CACHE_VERSION`] is refused outright;
//! there is no migration. The format trades portability for zero-copy bulk
//! transfer and makes no promise beyond "the build that wrote it reads it".

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::mem::size_of;
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::{DVec3, Vec3};
use tracing::info;

use crate::error::{CacheError, CacheResult};
use crate::geometry::{Cone, Cylinder, Sphere};
use crate::model::{Model, ModelDescriptor};

// ============================================================================
// Constants
// ============================================================================

/// Version stamp written as the first eight bytes of every cache file.
pub const CACHE_VERSION: u64 = 1;

/// Longest accepted string field. Anything above this is a corrupt file, not
/// a model name.
const MAX_STRING_LEN: u64 = 1 << 16;

// ============================================================================
// Saving
// ============================================================================

/// Write `models` to a cache file at `path`.
pub fn save_to_file(models: &[ModelDescriptor], path: impl AsRef<Path>) -> CacheResult<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_models(models, &mut writer)?;
    writer.flush()?;
    info!(path = %path.display(), models = models.len(), "saved scene cache");
    Ok(())
}

/// Serialize `models` into `writer`.
pub fn write_models(models: &[ModelDescriptor], writer: &mut impl Write) -> CacheResult<()> {
    writer.write_u64::<LittleEndian>(CACHE_VERSION)?;
    writer.write_u64::<LittleEndian>(models.len() as u64)?;
    for descriptor in models {
        write_model(descriptor, writer)?;
    }
    Ok(())
}

fn write_model(descriptor: &ModelDescriptor, w: &mut impl Write) -> CacheResult<()> {
    write_string(w, &descriptor.path)?;

    let model = descriptor.model();
    let materials = model.materials();
    w.write_u64::<LittleEndian>(materials.len() as u64)?;
    for (id, material) in materials {
        w.write_u64::<LittleEndian>(*id)?;
        write_string(w, &material.name)?;
        write_dvec3(w, material.diffuse_color)?;
        write_dvec3(w, material.specular_color)?;
        w.write_f64::<LittleEndian>(material.specular_exponent)?;
        w.write_f64::<LittleEndian>(material.reflection_index)?;
        w.write_f64::<LittleEndian>(material.opacity)?;
        w.write_f64::<LittleEndian>(material.refraction_index)?;
        w.write_f64::<LittleEndian>(material.emission)?;
        w.write_f64::<LittleEndian>(material.glossiness)?;
        w.write_u8(u8::from(material.casts_simulation_data))?;
    }

    let g = model.geometries();

    w.write_u64::<LittleEndian>(g.spheres.len() as u64)?;
    for (material, list) in &g.spheres {
        w.write_u64::<LittleEndian>(*material)?;
        w.write_u64::<LittleEndian>(list.len() as u64)?;
        w.write_all(bytemuck::cast_slice(list))?;
    }

    w.write_u64::<LittleEndian>(g.cylinders.len() as u64)?;
    for (material, list) in &g.cylinders {
        w.write_u64::<LittleEndian>(*material)?;
        w.write_u64::<LittleEndian>(list.len() as u64)?;
        w.write_all(bytemuck::cast_slice(list))?;
    }

    w.write_u64::<LittleEndian>(g.cones.len() as u64)?;
    for (material, list) in &g.cones {
        w.write_u64::<LittleEndian>(*material)?;
        w.write_u64::<LittleEndian>(list.len() as u64)?;
        w.write_all(bytemuck::cast_slice(list))?;
    }

    w.write_u64::<LittleEndian>(g.triangle_meshes.len() as u64)?;
    for (material, mesh) in &g.triangle_meshes {
        w.write_u64::<LittleEndian>(*material)?;
        w.write_u64::<LittleEndian>(mesh.vertices.len() as u64)?;
        w.write_all(bytemuck::cast_slice(&mesh.vertices))?;
        w.write_u64::<LittleEndian>(mesh.indices.len() as u64)?;
        w.write_all(bytemuck::cast_slice(&mesh.indices))?;
        w.write_u64::<LittleEndian>(mesh.normals.len() as u64)?;
        w.write_all(bytemuck::cast_slice(&mesh.normals))?;
        w.write_u64::<LittleEndian>(mesh.texture_coords.len() as u64)?;
        w.write_all(bytemuck::cast_slice(&mesh.texture_coords))?;
    }

    Ok(())
}

// ============================================================================
// Loading
// ============================================================================

/// Read every model stored in the cache file at `path`.
///
/// Fails on a version mismatch before anything is decoded; the caller decides
/// what to do with the returned descriptors.
pub fn load_from_file(path: impl AsRef<Path>) -> CacheResult<Vec<ModelDescriptor>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    // file size bounds every count read from the payload
    let limit = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let models = read_models(&mut reader, limit)?;
    info!(path = %path.display(), models = models.len(), "loaded scene cache");
    Ok(models)
}

/// Deserialize models from `reader`. `limit` is the payload size in bytes;
/// any count implying more data than that is rejected before allocation.
pub fn read_models(reader: &mut impl Read, limit: u64) -> CacheResult<Vec<ModelDescriptor>> {
    let version = reader.read_u64::<LittleEndian>()?;
    if version != CACHE_VERSION {
        return Err(CacheError::VersionMismatch {
            found: version,
            expected: CACHE_VERSION,
        });
    }

    let count = checked_count(reader.read_u64::<LittleEndian>()?, 1, limit)?;
    let mut models = Vec::with_capacity(count);
    for _ in 0..count {
        models.push(read_model(reader, limit)?);
    }
    Ok(models)
}

fn read_model(r: &mut impl Read, limit: u64) -> CacheResult<ModelDescriptor> {
    let path = read_string(r)?;
    let mut model = Model::new();

    let material_count = checked_count(r.read_u64::<LittleEndian>()?, 1, limit)?;
    for _ in 0..material_count {
        let id = r.read_u64::<LittleEndian>()?;
        let name = read_string(r)?;
        let material = model.create_material(id, &name);
        material.diffuse_color = read_dvec3(r)?;
        material.specular_color = read_dvec3(r)?;
        material.specular_exponent = r.read_f64::<LittleEndian>()?;
        material.reflection_index = r.read_f64::<LittleEndian>()?;
        material.opacity = r.read_f64::<LittleEndian>()?;
        material.refraction_index = r.read_f64::<LittleEndian>()?;
        material.emission = r.read_f64::<LittleEndian>()?;
        material.glossiness = r.read_f64::<LittleEndian>()?;
        material.casts_simulation_data = r.read_u8()? != 0;
    }

    let group_count = checked_count(r.read_u64::<LittleEndian>()?, 1, limit)?;
    for _ in 0..group_count {
        let material = r.read_u64::<LittleEndian>()?;
        let count = checked_count(
            r.read_u64::<LittleEndian>()?,
            size_of::<Sphere>() as u64,
            limit,
        )?;
        let spheres: Vec<Sphere> = read_pod_vec(r, count)?;
        model.spheres_mut().insert(material, spheres);
    }

    let group_count = checked_count(r.read_u64::<LittleEndian>()?, 1, limit)?;
    for _ in 0..group_count {
        let material = r.read_u64::<LittleEndian>()?;
        let count = checked_count(
            r.read_u64::<LittleEndian>()?,
            size_of::<Cylinder>() as u64,
            limit,
        )?;
        let cylinders: Vec<Cylinder> = read_pod_vec(r, count)?;
        model.cylinders_mut().insert(material, cylinders);
    }

    let group_count = checked_count(r.read_u64::<LittleEndian>()?, 1, limit)?;
    for _ in 0..group_count {
        let material = r.read_u64::<LittleEndian>()?;
        let count = checked_count(
            r.read_u64::<LittleEndian>()?,
            size_of::<Cone>() as u64,
            limit,
        )?;
        let cones: Vec<Cone> = read_pod_vec(r, count)?;
        model.cones_mut().insert(material, cones);
    }

    let group_count = checked_count(r.read_u64::<LittleEndian>()?, 1, limit)?;
    for _ in 0..group_count {
        let material = r.read_u64::<LittleEndian>()?;
        let mut meshes = model.triangle_meshes_mut();
        let mesh = meshes.entry(material).or_default();
        let count = checked_count(r.read_u64::<LittleEndian>()?, 12, limit)?;
        mesh.vertices = read_pod_vec::<Vec3>(r, count)?;
        let count = checked_count(r.read_u64::<LittleEndian>()?, 12, limit)?;
        mesh.indices = read_pod_vec::<[u32; 3]>(r, count)?;
        let count = checked_count(r.read_u64::<LittleEndian>()?, 12, limit)?;
        mesh.normals = read_pod_vec::<Vec3>(r, count)?;
        let count = checked_count(r.read_u64::<LittleEndian>()?, 8, limit)?;
        mesh.texture_coords = read_pod_vec::<[f32; 2]>(r, count)?;
    }

    let name = Path::new(&path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cached model".to_string());
    let mut descriptor = ModelDescriptor::new(model, name);
    descriptor.path = path;
    Ok(descriptor)
}

// ============================================================================
// Primitives
// ============================================================================

fn write_string(w: &mut impl Write, s: &str) -> CacheResult<()> {
    w.write_u64::<LittleEndian>(s.len() as u64)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_string(r: &mut impl Read) -> CacheResult<String> {
    let len = r.read_u64::<LittleEndian>()?;
    if len > MAX_STRING_LEN {
        return Err(CacheError::Corrupt(format!("string length {len} out of range")));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| CacheError::InvalidString)
}

fn write_dvec3(w: &mut impl Write, v: DVec3) -> CacheResult<()> {
    w.write_f64::<LittleEndian>(v.x)?;
    w.write_f64::<LittleEndian>(v.y)?;
    w.write_f64::<LittleEndian>(v.z)?;
    Ok(())
}

fn read_dvec3(r: &mut impl Read) -> CacheResult<DVec3> {
    Ok(DVec3::new(
        r.read_f64::<LittleEndian>()?,
        r.read_f64::<LittleEndian>()?,
        r.read_f64::<LittleEndian>()?,
    ))
}

/// Reject any element count whose payload could not fit in the file.
fn checked_count(count: u64, elem_size: u64, limit: u64) -> CacheResult<usize> {
    match count.checked_mul(elem_size) {
        Some(bytes) if bytes <= limit => Ok(count as usize),
        _ => Err(CacheError::Corrupt(format!(
            "block of {count} elements exceeds the file size"
        ))),
    }
}

/// Bulk-read `count` elements as raw bytes straight into a typed vector.
fn read_pod_vec<T: bytemuck::Pod>(r: &mut impl Read, count: usize) -> CacheResult<Vec<T>> {
    let mut v = vec![T::zeroed(); count];
    r.read_exact(bytemuck::cast_slice_mut(&mut v))?;
    Ok(v)
}

// ============================================================================
// Tests
// ============================================================================
