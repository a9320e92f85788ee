//! Acting on classified voice commands.

use smartshop_core::Product;
use tracing::info;

use super::Controller;
use crate::announce::spoken_amount;
use crate::cache::CacheBackend;
use crate::remote::RemoteStore;
use crate::voice::{VoiceClassifier, VoiceClip, VoiceCommand, VoiceError, VoiceIntent};

/// What a voice command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceOutcome {
    /// The search now shows this product and its price was announced.
    PriceChecked(Product),
    /// The product was added to the cart.
    Added { product: Product, quantity: u32 },
    /// The named product is not in the catalog.
    NotFound(String),
    /// Nothing actionable was heard.
    NotUnderstood,
    /// The classifier is not usable.
    Unavailable(VoiceError),
}

impl VoiceOutcome {
    /// Message the clerk must dismiss, if any.
    #[must_use]
    pub fn alert(&self) -> Option<String> {
        match self {
            Self::PriceChecked(_) | Self::Added { .. } => None,
            Self::NotFound(name) => Some(format!("Product \"{name}\" is not in stock.")),
            Self::NotUnderstood => Some("Could not make out a product name. Please say it again.".to_string()),
            Self::Unavailable(VoiceError::MissingKey) => Some(
                "Voice commands are not configured. Set GEMINI_API_KEY and restart.".to_string(),
            ),
            Self::Unavailable(VoiceError::InvalidKey) => {
                Some("The voice API key is not valid.".to_string())
            }
            Self::Unavailable(VoiceError::Service(message)) => {
                Some(format!("Voice service error: {message}"))
            }
        }
    }
}

impl<R: RemoteStore, B: CacheBackend> Controller<R, B> {
    /// Classify a clip against the current catalog and act on it.
    ///
    /// `classifier: None` means voice is not configured.
    pub async fn listen<C: VoiceClassifier>(
        &mut self,
        classifier: Option<&C>,
        clip: &VoiceClip,
        hint: Option<VoiceIntent>,
    ) -> VoiceOutcome {
        let Some(classifier) = classifier else {
            return self.apply_voice_command(Err(VoiceError::MissingKey));
        };
        let names: Vec<String> = self.state.products.iter().map(|p| p.name.clone()).collect();
        let result = classifier.classify(clip, &names, hint).await;
        self.apply_voice_command(result)
    }

    /// Act on a classifier answer.
    pub fn apply_voice_command(
        &mut self,
        result: Result<VoiceCommand, VoiceError>,
    ) -> VoiceOutcome {
        let command = match result {
            Ok(command) => command,
            Err(error) => {
                tracing::warn!(error = %error, "voice command unavailable");
                return VoiceOutcome::Unavailable(error);
            }
        };

        if command.intent == VoiceIntent::Unknown {
            return VoiceOutcome::NotUnderstood;
        }
        let Some(name) = command.product_name.filter(|n| !n.trim().is_empty()) else {
            return VoiceOutcome::NotUnderstood;
        };

        let Some(product) = self.state.product_named(&name).cloned() else {
            self.announcer
                .announce(&format!("Không tìm thấy sản phẩm {name}"));
            return VoiceOutcome::NotFound(name);
        };

        match command.intent {
            VoiceIntent::CheckPrice => {
                self.state.search_term.clone_from(&product.name);
                self.announcer.announce(&format!(
                    "Sản phẩm {} có giá {} đồng",
                    product.name,
                    spoken_amount(product.price)
                ));
                info!(product = %product.id, "voice price check");
                VoiceOutcome::PriceChecked(product)
            }
            VoiceIntent::AddToCart => {
                let quantity = command.quantity.filter(|q| *q > 0).unwrap_or(1);
                self.state.cart.add(&product, quantity);
                self.announcer
                    .announce(&format!("Đã thêm {quantity} {} vào giỏ", product.name));
                info!(product = %product.id, quantity, "voice add to cart");
                VoiceOutcome::Added { product, quantity }
            }
            VoiceIntent::Unknown => VoiceOutcome::NotUnderstood,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use smartshop_core::ProductId;

    use super::*;
    use crate::announce::RecordingAnnouncer;
    use crate::cache::{LocalCache, MemoryBackend};
    use crate::remote::MemoryRemote;
    use crate::voice::ScriptedClassifier;

    fn offline() -> (Controller<MemoryRemote, MemoryBackend>, RecordingAnnouncer) {
        let announcer = RecordingAnnouncer::new();
        let mut controller = Controller::new(None, LocalCache::new(MemoryBackend::new()))
            .with_announcer(announcer.clone());
        controller.start();
        (controller, announcer)
    }

    fn command(intent: VoiceIntent, name: &str, quantity: Option<u32>) -> VoiceCommand {
        VoiceCommand {
            intent,
            product_name: Some(name.to_string()),
            quantity,
        }
    }

    fn clip() -> VoiceClip {
        VoiceClip {
            audio: vec![0, 1, 2],
            mime_type: "audio/webm".to_string(),
        }
    }

    #[test]
    fn test_price_check_sets_search() {
        let (mut controller, announcer) = offline();
        let outcome = controller.apply_voice_command(Ok(command(
            VoiceIntent::CheckPrice,
            "nước mắm nam ngư",
            None,
        )));
        assert!(matches!(outcome, VoiceOutcome::PriceChecked(_)));
        assert_eq!(controller.state().search_term, "Nước Mắm Nam Ngư");
        assert_eq!(controller.visible_products().len(), 1);
        assert_eq!(
            announcer.last().as_deref(),
            Some("Sản phẩm Nước Mắm Nam Ngư có giá 32000 đồng")
        );
    }

    #[test]
    fn test_add_defaults_to_one() {
        let (mut controller, _) = offline();
        let outcome = controller.apply_voice_command(Ok(command(
            VoiceIntent::AddToCart,
            "Bột Giặt Omo 3kg",
            None,
        )));
        assert!(matches!(outcome, VoiceOutcome::Added { quantity: 1, .. }));
        assert_eq!(controller.state().cart.quantity_of(&ProductId::new("8")), 1);
    }

    #[test]
    fn test_unknown_product_is_announced() {
        let (mut controller, announcer) = offline();
        let outcome =
            controller.apply_voice_command(Ok(command(VoiceIntent::AddToCart, "Bia Hà Nội", Some(2))));
        assert_eq!(outcome, VoiceOutcome::NotFound("Bia Hà Nội".to_string()));
        assert!(outcome.alert().unwrap().contains("Bia Hà Nội"));
        assert_eq!(announcer.last().as_deref(), Some("Không tìm thấy sản phẩm Bia Hà Nội"));
        assert!(controller.state().cart.is_empty());
    }

    #[tokio::test]
    async fn test_listen_without_classifier() {
        let (mut controller, _) = offline();
        let outcome = controller
            .listen::<ScriptedClassifier>(None, &clip(), Some(VoiceIntent::AddToCart))
            .await;
        assert_eq!(outcome, VoiceOutcome::Unavailable(VoiceError::MissingKey));
        assert!(outcome.alert().unwrap().contains("GEMINI_API_KEY"));
    }

    #[tokio::test]
    async fn test_listen_uses_hint() {
        let (mut controller, _) = offline();
        let classifier = ScriptedClassifier::new([Ok(command(
            VoiceIntent::Unknown,
            "Mì Hảo Hảo Tôm Chua Cay",
            Some(5),
        ))]);
        let outcome = controller
            .listen(Some(&classifier), &clip(), Some(VoiceIntent::AddToCart))
            .await;
        assert!(matches!(outcome, VoiceOutcome::Added { quantity: 5, .. }));

        let outcome = controller.listen(Some(&classifier), &clip(), None).await;
        assert_eq!(outcome, VoiceOutcome::NotUnderstood);
    }
}
