use crate::domain::service::{ServiceDescriptor, ServiceId};

pub const DEFAULT_SERVICE_ICON: &str = "<:qlf:1364046376249462825>";

/// Services offered in the selection menu, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceCatalog {
    services: Vec<ServiceDescriptor>,
}

impl Default for ServiceCatalog {
    fn default() -> Self {
        Self::new(vec![
            ServiceDescriptor::new("SynthX", "SynthX - Tha Bronx 3", DEFAULT_SERVICE_ICON),
            ServiceDescriptor::new("Boosts Reward", "Boosts - Reward", DEFAULT_SERVICE_ICON),
        ])
    }
}

impl ServiceCatalog {
    pub fn new(services: Vec<ServiceDescriptor>) -> Self {
        Self { services }
    }

    pub fn list(&self) -> &[ServiceDescriptor] {
        &self.services
    }

    pub fn get(&self, id: &ServiceId) -> Option<&ServiceDescriptor> {
        self.services.iter().find(|service| &service.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::ServiceCatalog;
    use crate::domain::service::{ServiceDescriptor, ServiceId};

    #[test]
    fn list_preserves_declaration_order() {
        let catalog = ServiceCatalog::new(vec![
            ServiceDescriptor::new("b", "Second letter", ":b:"),
            ServiceDescriptor::new("a", "First letter", ":a:"),
        ]);

        let ids: Vec<&str> = catalog.list().iter().map(|service| service.id.0.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn default_catalog_offers_synthx() {
        let catalog = ServiceCatalog::default();
        let synthx = catalog.get(&ServiceId("SynthX".to_owned())).expect("SynthX is listed");
        assert_eq!(synthx.display_name, "SynthX - Tha Bronx 3");
        assert!(catalog.get(&ServiceId("synthx".to_owned())).is_none());
        assert_eq!(catalog.list().len(), 2);
    }
}
