use std::collections::HashMap;

use crate::{ChannelLayout, Model, ModelId};

/// Built-in models that can be copied into a show.
#[derive(Default)]
pub struct ModelLibrary {
    pub models: HashMap<String, Model>,
}

macro_rules! library_model {
    ($name:expr, $channels:expr) => {
        Model::new(
            ModelId::default(),
            $name,
            ChannelLayout::parse($channels).expect("built-in channel layout"),
        )
    };
}

impl ModelLibrary {
    pub fn new() -> Self {
        let mut models = HashMap::new();

        // Define all models. Note in the future we'll load these from disk.
        models.insert("dimmer".to_string(), library_model!("Generic Dimmer", "D"));
        models.insert("rgb-par".to_string(), library_model!("RGB PAR", "RGB"));
        models.insert(
            "rgbw-par".to_string(),
            library_model!("LED Flat PAR 12x3W RGBW", "DRGBW00"),
        );
        models.insert(
            "cmy-wash".to_string(),
            library_model!("CMY Wash", "DCMYZ").with_zoom(12.0, 55.0),
        );
        models.insert(
            "led-spot-60w".to_string(),
            library_model!("LED Spot 60W", "PTRGBD0").with_pan_tilt(540.0, 180.0),
        );
        models.insert(
            "moving-head-16bit".to_string(),
            // Pan/tilt fine channels, shutter open on channel 7
            library_model!("Moving Head 16-bit", "PpTtDd1RGBWZF")
                .with_pan_tilt(540.0, 270.0)
                .with_zoom(8.0, 42.0),
        );

        ModelLibrary { models }
    }

    /// Copy a library model under a show-local id.
    pub fn instantiate(&self, key: &str, id: ModelId) -> Option<Model> {
        self.models.get(key).map(|model| Model {
            id,
            ..model.clone()
        })
    }
}
