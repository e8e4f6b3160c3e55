use std::{collections::HashMap, sync::Arc};

use crate::error::FontDataError;
use crate::font_face::{FontDescriptor, SdfFontData, SdfFontFace};
use crate::text::TextId;
use crate::texture::TextureHandle;

/// Registry of SDF font faces owned by one stage.
///
/// Face matching (family fallback, weight, style and stretch) is delegated
/// to `fontdb`, which implements the CSS font matching algorithm. SDF faces
/// usually have no outline data, so they are registered with their
/// descriptor only; faces built from a TTF/OTF binary are parsed by `fontdb`
/// and measured with `fontdue`.
pub struct FontRegistry {
    /// Face descriptions used for matching.
    font_db: fontdb::Database,
    /// Metrics, atlas and load state per face.
    faces: HashMap<fontdb::ID, SdfFontFace, fxhash::FxBuildHasher>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            font_db: fontdb::Database::new(),
            faces: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
        }
    }
}

/// Registering faces.
impl FontRegistry {
    /// Registers a face whose metrics arrive later through
    /// [`Self::mark_loaded`].
    pub fn register_face(&mut self, descriptor: FontDescriptor, atlas: TextureHandle) -> fontdb::ID {
        let id = self.font_db.push_face_info(fontdb::FaceInfo {
            id: fontdb::ID::dummy(),
            source: fontdb::Source::Binary(Arc::new(Vec::<u8>::new())),
            index: 0,
            families: vec![(
                descriptor.family.clone(),
                fontdb::Language::English_UnitedStates,
            )],
            post_script_name: descriptor.family.replace(' ', ""),
            style: descriptor.style,
            weight: descriptor.weight,
            stretch: descriptor.stretch,
            monospaced: false,
        });
        self.faces.insert(id, SdfFontFace::new(descriptor, atlas));
        id
    }

    /// Registers an outline font and builds its metrics table for `charset`
    /// at `size` pixels. The face is loaded immediately; `atlas` is the
    /// distance field texture generated for the same charset and size.
    pub fn load_font_binary(
        &mut self,
        data: impl Into<Vec<u8>>,
        size: f32,
        distance_range: f32,
        charset: &str,
        atlas: TextureHandle,
    ) -> Result<fontdb::ID, FontDataError> {
        let data: Arc<Vec<u8>> = Arc::new(data.into());
        let font = fontdue::Font::from_bytes(
            data.as_slice(),
            fontdue::FontSettings {
                collection_index: 0,
                scale: size,
                load_substitutions: true,
            },
        )
        .map_err(|e| FontDataError::InvalidFontBinary(e.to_string()))?;
        let metrics = SdfFontData::from_font(&font, size, distance_range, charset)?;

        let ids = self
            .font_db
            .load_font_source(fontdb::Source::Binary(Arc::clone(&data) as _));
        let id = *ids.first().ok_or_else(|| {
            FontDataError::InvalidFontBinary("no face found in font binary".into())
        })?;
        let descriptor = match self.font_db.face(id) {
            Some(info) => FontDescriptor {
                family: info
                    .families
                    .first()
                    .map(|(name, _)| name.clone())
                    .unwrap_or_default(),
                weight: info.weight,
                style: info.style,
                stretch: info.stretch,
            },
            None => {
                return Err(FontDataError::InvalidFontBinary(
                    "face vanished after loading".into(),
                ));
            }
        };

        let mut face = SdfFontFace::new(descriptor, atlas);
        face.set_loaded(metrics);
        self.faces.insert(id, face);
        Ok(id)
    }

    /// Removes a face. Text elements using it fail to resolve on their next
    /// update.
    pub fn remove_face(&mut self, id: fontdb::ID) -> Option<SdfFontFace> {
        self.font_db.remove_face(id);
        self.faces.remove(&id)
    }

    pub fn clear(&mut self) {
        let ids: Vec<fontdb::ID> = self.faces.keys().copied().collect();
        for id in ids {
            self.remove_face(id);
        }
    }

    /// Checks if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Returns the number of registered faces.
    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// Sets the family name for the "serif" generic family.
    pub fn set_serif_family(&mut self, family: impl Into<String>) {
        self.font_db.set_serif_family(family);
    }

    /// Sets the family name for the "sans-serif" generic family.
    pub fn set_sans_serif_family(&mut self, family: impl Into<String>) {
        self.font_db.set_sans_serif_family(family);
    }

    /// Sets the family name for the "cursive" generic family.
    pub fn set_cursive_family(&mut self, family: impl Into<String>) {
        self.font_db.set_cursive_family(family);
    }

    /// Sets the family name for the "fantasy" generic family.
    pub fn set_fantasy_family(&mut self, family: impl Into<String>) {
        self.font_db.set_fantasy_family(family);
    }

    /// Sets the family name for the "monospace" generic family.
    pub fn set_monospace_family(&mut self, family: impl Into<String>) {
        self.font_db.set_monospace_family(family);
    }
}

/// Load notifications.
impl FontRegistry {
    /// Stores the metrics of `id` and returns the text elements that were
    /// waiting for it.
    pub fn mark_loaded(&mut self, id: fontdb::ID, data: SdfFontData) -> Vec<TextId> {
        match self.faces.get_mut(&id) {
            Some(face) => face.set_loaded(data),
            None => {
                log::warn!("metrics for unknown font face {:?}", id);
                Vec::new()
            }
        }
    }

    pub fn mark_failed(&mut self, id: fontdb::ID, reason: impl Into<String>) -> Vec<TextId> {
        match self.faces.get_mut(&id) {
            Some(face) => face.set_failed(reason),
            None => Vec::new(),
        }
    }
}

/// Get `SdfFontFace`
impl FontRegistry {
    /// Finds the best matching face for `descriptor`.
    ///
    /// The CSS generic names (`serif`, `sans-serif`, `monospace`, `cursive`,
    /// `fantasy`) map to the families configured with the `set_*_family`
    /// methods.
    pub fn resolve(&self, descriptor: &FontDescriptor) -> Option<fontdb::ID> {
        let family = match descriptor.family.trim().to_ascii_lowercase().as_str() {
            "serif" => fontdb::Family::Serif,
            "sans-serif" => fontdb::Family::SansSerif,
            "monospace" => fontdb::Family::Monospace,
            "cursive" => fontdb::Family::Cursive,
            "fantasy" => fontdb::Family::Fantasy,
            _ => fontdb::Family::Name(descriptor.family.trim()),
        };
        let id = self.font_db.query(&fontdb::Query {
            families: &[family],
            weight: descriptor.weight,
            stretch: descriptor.stretch,
            style: descriptor.style,
        })?;
        self.faces.contains_key(&id).then_some(id)
    }

    pub fn face(&self, id: fontdb::ID) -> Option<&SdfFontFace> {
        self.faces.get(&id)
    }

    pub fn face_mut(&mut self, id: fontdb::ID) -> Option<&mut SdfFontFace> {
        self.faces.get_mut(&id)
    }

    /// Returns an iterator over all registered faces.
    pub fn faces(&self) -> impl Iterator<Item = (fontdb::ID, &SdfFontFace)> {
        self.faces.iter().map(|(&id, face)| (id, face))
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::time::Instant;

    use parking_lot::Mutex;

    use super::*;
    use crate::font_face::FontFaceState;
    use crate::texture::test_support::counting_loader;
    use crate::texture::{Texture, TextureId};

    fn atlas() -> TextureHandle {
        let (loader, _) = counting_loader();
        Arc::new(Mutex::new(Texture::new(TextureId(1), loader, Instant::now())))
    }

    fn descriptor(family: &str, weight: u16) -> FontDescriptor {
        FontDescriptor {
            weight: fontdb::Weight(weight),
            ..FontDescriptor::new(family)
        }
    }

    #[test]
    fn resolves_by_weight() {
        let mut fonts = FontRegistry::new();
        let regular = fonts.register_face(descriptor("Ubuntu", 400), atlas());
        let bold = fonts.register_face(descriptor("Ubuntu", 700), atlas());

        assert_eq!(fonts.resolve(&descriptor("Ubuntu", 400)), Some(regular));
        assert_eq!(fonts.resolve(&descriptor("Ubuntu", 700)), Some(bold));
        assert_eq!(fonts.resolve(&descriptor("Ubuntu", 600)), Some(bold));
        assert_eq!(fonts.resolve(&descriptor("Ubuntu", 300)), Some(regular));
        assert_eq!(fonts.len(), 2);
    }

    #[test]
    fn unknown_family_does_not_resolve() {
        let mut fonts = FontRegistry::new();
        fonts.register_face(descriptor("Ubuntu", 400), atlas());
        assert_eq!(fonts.resolve(&descriptor("Roboto", 400)), None);
    }

    #[test]
    fn generic_families_follow_configuration() {
        let mut fonts = FontRegistry::new();
        let id = fonts.register_face(descriptor("Ubuntu", 400), atlas());
        assert_eq!(fonts.resolve(&FontDescriptor::new("sans-serif")), None);
        fonts.set_sans_serif_family("Ubuntu");
        assert_eq!(fonts.resolve(&FontDescriptor::new("sans-serif")), Some(id));
    }

    #[test]
    fn waiters_are_handed_back_once() {
        let mut fonts = FontRegistry::new();
        let id = fonts.register_face(descriptor("Ubuntu", 400), atlas());
        let face = fonts.face_mut(id).unwrap();
        face.once_loaded(TextId(1));
        face.once_loaded(TextId(2));
        face.once_loaded(TextId(1));

        let waiters = fonts.mark_loaded(id, SdfFontData::monospace(42.0, 20.0, "ab"));
        assert_eq!(waiters, vec![TextId(1), TextId(2)]);
        assert!(fonts.face(id).unwrap().loaded());
        assert!(fonts.mark_loaded(id, SdfFontData::monospace(42.0, 20.0, "ab")).is_empty());
    }

    #[test]
    fn failure_is_recorded() {
        let mut fonts = FontRegistry::new();
        let id = fonts.register_face(descriptor("Ubuntu", 400), atlas());
        fonts.face_mut(id).unwrap().once_loaded(TextId(9));
        assert_eq!(fonts.mark_failed(id, "404"), vec![TextId(9)]);
        assert_eq!(
            fonts.face(id).unwrap().state(),
            &FontFaceState::Failed("404".into())
        );
    }

    #[test]
    fn removed_face_no_longer_resolves() {
        let mut fonts = FontRegistry::new();
        let id = fonts.register_face(descriptor("Ubuntu", 400), atlas());
        assert!(fonts.remove_face(id).is_some());
        assert_eq!(fonts.resolve(&descriptor("Ubuntu", 400)), None);
        assert!(fonts.is_empty());
    }

    #[test]
    fn garbage_binary_is_rejected() {
        let mut fonts = FontRegistry::new();
        let result = fonts.load_font_binary(vec![0u8; 16], 42.0, 4.0, "abc", atlas());
        assert!(matches!(result, Err(FontDataError::InvalidFontBinary(_))));
        assert!(fonts.is_empty());
    }
}
