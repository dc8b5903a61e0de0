mod common;

use pbr_ibl::textures::{BindlessHandle, ResidentTextureSet, MAX_RESIDENT_TEXTURES};

#[test]
fn loads_are_deduplicated_and_failures_return_null() {
    let Some(ctx) = common::bindless_context("loads_are_deduplicated_and_failures_return_null") else {
        return;
    };
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("albedo.png");
    image::RgbaImage::from_pixel(4, 4, image::Rgba([200, 100, 50, 255])).save(&path).expect("write png");

    let mut textures = ResidentTextureSet::new(&ctx).expect("texture set");
    assert_eq!(textures.len(), 1);
    let revision = textures.revision();

    let first = textures.load(&ctx, &path);
    assert!(!first.is_null());
    assert_eq!(first.slot(), 1);
    assert_eq!(textures.load(&ctx, &path), first);
    assert_eq!(textures.len(), 2);
    assert_eq!(textures.revision(), revision + 1);
    assert_eq!(textures.source(first), Some(path.as_path()));

    let missing = textures.load(&ctx, &dir.path().join("missing.png"));
    assert_eq!(missing, BindlessHandle::NULL);
    assert_eq!(missing.slot(), 0);
    assert_eq!(textures.len(), 2);
}

#[test]
fn array_is_padded_and_capacity_is_enforced() {
    let Some(ctx) = common::bindless_context("array_is_padded_and_capacity_is_enforced") else {
        return;
    };
    let mut textures = ResidentTextureSet::new(&ctx).expect("texture set");
    assert_eq!(textures.array_views().len(), MAX_RESIDENT_TEXTURES);
    assert!(textures.insert_rgba8(&ctx, 2, 2, &[0; 12]).is_err(), "short texel buffer");

    while textures.len() < MAX_RESIDENT_TEXTURES {
        textures.insert_rgba8(&ctx, 1, 1, &[255; 4]).expect("free slot");
    }
    assert!(textures.insert_rgba8(&ctx, 1, 1, &[255; 4]).is_err());
    assert_eq!(textures.array_views().len(), MAX_RESIDENT_TEXTURES);
}
