//! Class ids, asset categories and conventional extensions.

use std::borrow::Cow;
use std::fmt;

/// Engine class ids the catalog treats specially.
pub mod class {
    pub const GAME_OBJECT: i32 = 1;
    pub const TRANSFORM: i32 = 4;
    pub const MATERIAL: i32 = 21;
    pub const TEXTURE_2D: i32 = 28;
    pub const MESH: i32 = 43;
    pub const SHADER: i32 = 48;
    pub const TEXT_ASSET: i32 = 49;
    pub const ANIMATION_CLIP: i32 = 74;
    pub const AUDIO_CLIP: i32 = 83;
    pub const CUBEMAP: i32 = 89;
    pub const MONO_BEHAVIOUR: i32 = 114;
    pub const MONO_SCRIPT: i32 = 115;
    pub const TEXTURE_3D: i32 = 117;
    pub const FONT: i32 = 128;
    pub const ASSET_BUNDLE: i32 = 142;
    pub const PRELOAD_DATA: i32 = 150;
    pub const TEXTURE_2D_ARRAY: i32 = 187;
    pub const SPRITE: i32 = 213;
    pub const RECT_TRANSFORM: i32 = 224;
    pub const ASSET_BUNDLE_MANIFEST: i32 = 290;
    pub const VIDEO_CLIP: i32 = 329;
}

/// Kind of asset an entry holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Image,
    Audio,
    Text,
    Shader,
    Font,
    Mesh,
    Material,
    Animation,
    Sprite,
    Script,
    Video,
    /// Anything else, by class id.
    Other(i32),
}

impl Category {
    /// Classify an engine class id.
    pub fn from_class_id(class_id: i32) -> Self {
        match class_id {
            class::TEXTURE_2D | class::CUBEMAP | class::TEXTURE_3D | class::TEXTURE_2D_ARRAY => Category::Image,
            class::AUDIO_CLIP => Category::Audio,
            class::TEXT_ASSET => Category::Text,
            class::SHADER => Category::Shader,
            class::FONT => Category::Font,
            class::MESH => Category::Mesh,
            class::MATERIAL => Category::Material,
            class::ANIMATION_CLIP => Category::Animation,
            class::SPRITE => Category::Sprite,
            class::MONO_BEHAVIOUR | class::MONO_SCRIPT => Category::Script,
            class::VIDEO_CLIP => Category::Video,
            other => Category::Other(other),
        }
    }

    /// Category implied by a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Some(match ext.as_str() {
            "png" | "jpg" | "jpeg" | "tga" | "bmp" | "dds" => Category::Image,
            "wav" | "ogg" | "mp3" | "m4a" => Category::Audio,
            "txt" | "json" | "xml" | "csv" | "bytes" => Category::Text,
            "shader" => Category::Shader,
            "ttf" | "otf" => Category::Font,
            "mesh" => Category::Mesh,
            "mat" => Category::Material,
            "anim" => Category::Animation,
            "sprite" => Category::Sprite,
            "dat" => Category::Script,
            "mp4" | "webm" | "ogv" => Category::Video,
            _ => return None,
        })
    }

    /// Category implied by a name's extension.
    pub fn from_name(name: &str) -> Option<Self> {
        extension(name).and_then(Self::from_extension)
    }

    /// Conventional extension appended to names that have none.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Category::Image => Some("png"),
            Category::Audio => Some("wav"),
            Category::Text => Some("txt"),
            Category::Shader => Some("shader"),
            Category::Font => Some("ttf"),
            Category::Mesh => Some("mesh"),
            Category::Material => Some("mat"),
            Category::Animation => Some("anim"),
            Category::Sprite => Some("sprite"),
            Category::Script => Some("dat"),
            Category::Video => Some("mp4"),
            Category::Other(_) => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Image => "image",
            Category::Audio => "audio",
            Category::Text => "text",
            Category::Shader => "shader",
            Category::Font => "font",
            Category::Mesh => "mesh",
            Category::Material => "material",
            Category::Animation => "animation",
            Category::Sprite => "sprite",
            Category::Script => "script",
            Category::Video => "video",
            Category::Other(id) => return write!(f, "Type{id}"),
        };
        f.write_str(s)
    }
}

/// Objects that only describe scene structure or the bundle itself.
pub fn is_structural(class_id: i32) -> bool {
    matches!(
        class_id,
        class::GAME_OBJECT
            | class::TRANSFORM
            | class::RECT_TRANSFORM
            | class::ASSET_BUNDLE
            | class::ASSET_BUNDLE_MANIFEST
            | class::PRELOAD_DATA
    )
}

/// Engine class name for the common class ids.
pub(crate) fn class_name(class_id: i32) -> Option<&'static str> {
    Some(match class_id {
        1 => "GameObject",
        4 => "Transform",
        21 => "Material",
        23 => "MeshRenderer",
        28 => "Texture2D",
        33 => "MeshFilter",
        43 => "Mesh",
        48 => "Shader",
        49 => "TextAsset",
        74 => "AnimationClip",
        83 => "AudioClip",
        89 => "Cubemap",
        90 => "Avatar",
        91 => "AnimatorController",
        95 => "Animator",
        114 => "MonoBehaviour",
        115 => "MonoScript",
        117 => "Texture3D",
        128 => "Font",
        137 => "SkinnedMeshRenderer",
        142 => "AssetBundle",
        150 => "PreloadData",
        152 => "MovieTexture",
        187 => "Texture2DArray",
        212 => "SpriteRenderer",
        213 => "Sprite",
        221 => "AnimatorOverrideController",
        224 => "RectTransform",
        290 => "AssetBundleManifest",
        329 => "VideoClip",
        687078895 => "SpriteAtlas",
        _ => return None,
    })
}

/// Class name for diagnostics, `Type{id}` when the id is not in the table.
pub(crate) fn class_label(class_id: i32) -> Cow<'static, str> {
    class_name(class_id).map_or_else(|| Cow::Owned(format!("Type{class_id}")), Cow::Borrowed)
}

/// Extension of the last path component, when it looks like one.
///
/// An extension is one to five ASCII alphanumerics after the last dot.
pub fn extension(name: &str) -> Option<&str> {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let (stem, ext) = file.rsplit_once('.')?;
    let plausible = !stem.is_empty() && (1..=5).contains(&ext.len()) && ext.bytes().all(|b| b.is_ascii_alphanumeric());
    plausible.then_some(ext)
}
