//! Resource Layer Tests
//!
//! Tests for:
//! - Mesh: attribute alignment validation, index range checks, index width selection
//! - Image: payload size validation, solid-color fallback
//! - Material: slot assignment, dirty mask accumulation and take semantics
//! - ResourceCache: name deduplication, weak-reference lifetime, purge
//! - Background loading: worker decode marshaled through drain_loaded

use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};

use cinder::resources::{
    Image, IndexKind, MAX_U16_VERTEX_COUNT, Material, MaterialDirty, Mesh, Resource,
    ResourceCache, TextureSlot,
};

fn quad_mesh() -> Mesh {
    Mesh::new(
        vec![
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
        ],
        vec![Vec3::Z; 4],
        vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ],
        vec![0, 1, 2, 0, 2, 3],
    )
    .unwrap()
}

fn checker_image() -> Image {
    Image::new(2, 2, 1, wgpu::TextureFormat::Rgba8Unorm, vec![0u8; 16]).unwrap()
}

// ============================================================================
// Mesh Tests
// ============================================================================

#[test]
fn mesh_accepts_aligned_attributes() {
    let mesh = quad_mesh();
    assert_eq!(mesh.vertex_count(), 4);
    assert_eq!(mesh.index_count(), 6);
}

#[test]
fn mesh_rejects_empty_positions() {
    assert!(Mesh::new(vec![], vec![], vec![], vec![0]).is_err());
}

#[test]
fn mesh_rejects_empty_indices() {
    assert!(Mesh::new(vec![Vec3::ZERO], vec![], vec![], vec![]).is_err());
}

#[test]
fn mesh_rejects_misaligned_normals() {
    let result = Mesh::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        vec![Vec3::Z; 2],
        vec![],
        vec![0, 1, 2],
    );
    assert!(result.is_err());
}

#[test]
fn mesh_rejects_out_of_range_index() {
    let result = Mesh::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        vec![],
        vec![],
        vec![0, 1, 3],
    );
    assert!(result.is_err());
}

#[test]
fn mesh_allows_missing_optional_attributes() {
    let mesh = Mesh::new(
        vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        vec![],
        vec![],
        vec![0, 1, 2],
    )
    .unwrap();
    assert_eq!(mesh.normal_or_zero(1), Vec3::ZERO);
    assert_eq!(mesh.uv_or_zero(2), Vec2::ZERO);
}

#[test]
fn index_kind_is_u16_at_the_boundary() {
    assert_eq!(IndexKind::for_vertex_count(4), IndexKind::U16);
    assert_eq!(
        IndexKind::for_vertex_count(MAX_U16_VERTEX_COUNT),
        IndexKind::U16
    );
}

#[test]
fn index_kind_is_u32_past_the_boundary() {
    assert_eq!(
        IndexKind::for_vertex_count(MAX_U16_VERTEX_COUNT + 1),
        IndexKind::U32
    );
    assert_eq!(IndexKind::for_vertex_count(70_000), IndexKind::U32);
}

#[test]
fn large_mesh_selects_wide_indices() {
    let count = 70_000;
    let positions: Vec<Vec3> = (0..count).map(|i| Vec3::splat(i as f32)).collect();
    let indices: Vec<u32> = (0..count as u32).collect();
    let mesh = Mesh::new(positions, vec![], vec![], indices).unwrap();

    assert_eq!(mesh.index_kind(), IndexKind::U32);
    // 4 bytes per index once past the 16-bit range
    assert_eq!(
        mesh.index_kind().byte_size() * mesh.index_count() as u64,
        4 * count as u64
    );
}

// ============================================================================
// Image Tests
// ============================================================================

#[test]
fn image_validates_payload_size() {
    assert!(Image::new(2, 2, 1, wgpu::TextureFormat::Rgba8Unorm, vec![0u8; 16]).is_ok());
    assert!(Image::new(2, 2, 1, wgpu::TextureFormat::Rgba8Unorm, vec![0u8; 15]).is_err());
    assert!(Image::new(2, 2, 6, wgpu::TextureFormat::Rgba8Unorm, vec![0u8; 16]).is_err());
}

#[test]
fn solid_color_is_one_pixel() {
    let image = Image::solid_color([255, 0, 255, 255]);
    assert_eq!((image.width, image.height, image.layers), (1, 1, 1));
    assert_eq!(image.data, vec![255, 0, 255, 255]);
}

// ============================================================================
// Material Tests
// ============================================================================

#[test]
fn new_material_is_fully_dirty() {
    let material = Material::new("test");
    assert_eq!(material.dirty(), MaterialDirty::all());
}

#[test]
fn take_dirty_clears_the_mask() {
    let mut material = Material::new("test");
    assert_eq!(material.take_dirty(), MaterialDirty::all());
    assert!(material.dirty().is_empty());
}

#[test]
fn set_texture_marks_only_its_slot() {
    let mut material = Material::new("test");
    material.take_dirty();

    let image = Arc::new(Resource::image("albedo.png", checker_image()));
    material.set_texture(TextureSlot::Albedo, image).unwrap();
    assert_eq!(material.dirty(), MaterialDirty::ALBEDO);
}

#[test]
fn set_texture_rejects_non_image_resources() {
    let mut material = Material::new("test");
    let mesh = Arc::new(Resource::mesh("quad", quad_mesh()));
    assert!(material.set_texture(TextureSlot::Albedo, mesh).is_err());
}

#[test]
fn set_scalar_marks_scalars() {
    let mut material = Material::new("test");
    material.take_dirty();
    material.set_scalar(TextureSlot::Roughness, 0.5);
    assert_eq!(material.dirty(), MaterialDirty::SCALARS);
    assert!((material.scalar(TextureSlot::Roughness) - 0.5).abs() < 1e-6);
}

#[test]
fn clear_texture_on_empty_slot_stays_clean() {
    let mut material = Material::new("test");
    material.take_dirty();
    material.clear_texture(TextureSlot::Normal);
    assert!(material.dirty().is_empty());
}

#[test]
fn default_scalars_are_one() {
    let material = Material::new("test");
    for slot in TextureSlot::ALL {
        assert!((material.scalar(slot) - 1.0).abs() < 1e-6);
    }
}

// ============================================================================
// ResourceCache Tests
// ============================================================================

#[test]
fn cache_returns_existing_entry_for_same_name() {
    let cache = ResourceCache::new();
    let first = cache.cache_image("tex.png", checker_image());
    let second = cache.cache_image("tex.png", checker_image());
    assert_eq!(first.uuid, second.uuid);
    assert_eq!(cache.live_count(), 1);
}

#[test]
fn cache_distinguishes_names() {
    let cache = ResourceCache::new();
    let a = cache.cache_image("a.png", checker_image());
    let b = cache.cache_image("b.png", checker_image());
    assert_ne!(a.uuid, b.uuid);
    assert_eq!(cache.live_count(), 2);
}

#[test]
fn dropping_all_holders_removes_the_entry() {
    let cache = ResourceCache::new();
    let resource = cache.cache_image("tex.png", checker_image());
    assert!(cache.get("tex.png").is_some());

    drop(resource);
    assert!(cache.get("tex.png").is_none());
    assert_eq!(cache.live_count(), 0);
}

#[test]
fn recache_after_release_creates_a_fresh_entry() {
    let cache = ResourceCache::new();
    let first_uuid = cache.cache_image("tex.png", checker_image()).uuid;
    // First Arc dropped at the end of the statement above.
    let second = cache.cache_image("tex.png", checker_image());
    assert_ne!(first_uuid, second.uuid);
}

#[test]
fn typed_getters_filter_by_kind() {
    let cache = ResourceCache::new();
    let _img = cache.cache_image("thing", checker_image());
    assert!(cache.get_image("thing").is_some());
    assert!(cache.get_mesh("thing").is_none());
    assert!(cache.get_material("thing").is_none());
}

#[test]
fn purge_drops_dead_bookkeeping() {
    let cache = ResourceCache::new();
    {
        let _r = cache.cache_image("tex.png", checker_image());
    }
    cache.purge();
    assert_eq!(cache.live_count(), 0);
}

// ============================================================================
// Background Loading Tests
// ============================================================================

fn drain_until(cache: &ResourceCache, expected: usize) -> Vec<Arc<Resource>> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut out = Vec::new();
    while out.len() < expected && Instant::now() < deadline {
        out.extend(cache.drain_loaded());
        std::thread::sleep(Duration::from_millis(5));
    }
    out
}

#[test]
fn background_load_appears_after_drain() {
    let cache = ResourceCache::new();
    cache.load_image_async("bg.png", || {
        Ok(Image::solid_color([1, 2, 3, 255]))
    });

    let loaded = drain_until(&cache, 1);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].name, "bg.png");
    assert!(cache.get_image("bg.png").is_some());
}

#[test]
fn failed_background_load_yields_no_entry() {
    let cache = ResourceCache::new();
    cache.load_image_async("broken.png", || Err("decode failed".to_string()));

    // Give the worker time to finish, then drain.
    std::thread::sleep(Duration::from_millis(100));
    let loaded = cache.drain_loaded();
    assert!(loaded.is_empty());
    assert!(cache.get("broken.png").is_none());
}

#[test]
fn background_load_skips_already_cached_names() {
    let cache = ResourceCache::new();
    let existing = cache.cache_image("tex.png", checker_image());
    cache.load_image_async("tex.png", || {
        panic!("decode should never run for a cached name")
    });

    std::thread::sleep(Duration::from_millis(100));
    cache.drain_loaded();
    assert_eq!(cache.get("tex.png").unwrap().uuid, existing.uuid);
}
