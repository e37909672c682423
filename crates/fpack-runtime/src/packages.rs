//! Package selection per feature pack
//!
//! Packages come from two places: the packages a feature-pack config selects
//! (defaults unless `inherit-packages = false`, minus exclusions, plus
//! explicit inclusions) and the package dependencies of the feature specs
//! whose features were included. [`PackageResolver::resolve`] follows package
//! dependencies transitively, across packs through origins.

use crate::error::{ProvisioningError, ProvisioningResult};
use crate::resolved::ResolvedFeatureSpec;
use crate::spec_index::{Context, SpecIndex};
use fpack_spec::{FeaturePackConfig, FeaturePackLayout, Gav, ResolvedSpecId};
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

#[derive(Debug, Default)]
struct PackPackages {
    selected: IndexSet<String>,
    excluded: HashSet<String>,
}

impl PackPackages {
    /// Excluded by some visit and selected by none
    fn is_excluded(&self, name: &str) -> bool {
        self.excluded.contains(name) && !self.selected.contains(name)
    }
}

/// A package that has to be installed, and who asked for it
#[derive(Debug, Clone)]
struct Requirement {
    gav: Gav,
    name: String,
    optional: bool,
    required_by: String,
}

#[derive(Debug, Default)]
pub struct PackageResolver {
    packs: IndexMap<Gav, PackPackages>,
    spec_requirements: Vec<Requirement>,
    required_specs: HashSet<ResolvedSpecId>,
}

impl PackageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the package selection of a feature-pack config. A package
    /// selected by any visit of the pack is installed even when another
    /// visit excluded it.
    pub fn visit(&mut self, layout: &FeaturePackLayout, config: &FeaturePackConfig) {
        let packages = self.packs.entry(layout.gav().clone()).or_default();
        packages
            .excluded
            .extend(config.excluded_packages.iter().cloned());

        if config.inherit_packages {
            for name in &layout.spec.default_packages {
                if !config.is_package_excluded(name) {
                    packages.selected.insert(name.clone());
                }
            }
        }
        packages
            .selected
            .extend(config.included_packages.iter().cloned());
    }

    /// Require the package dependencies of an included spec, once per spec
    pub fn require_spec(&mut self, spec: &ResolvedFeatureSpec) {
        if !self.required_specs.insert(spec.id.clone()) {
            return;
        }
        for dependency in &spec.packages {
            self.spec_requirements.push(Requirement {
                gav: dependency.gav.clone(),
                name: dependency.name.clone(),
                optional: dependency.optional,
                required_by: spec.id.to_string(),
            });
        }
    }

    /// Resolve the selection and every package dependency, in resolution
    /// order per pack
    pub fn resolve(&self, index: &SpecIndex) -> ProvisioningResult<IndexMap<Gav, Vec<String>>> {
        let mut queue: VecDeque<Requirement> = self
            .packs
            .iter()
            .flat_map(|(gav, packages)| {
                packages.selected.iter().map(move |name| Requirement {
                    gav: gav.clone(),
                    name: name.clone(),
                    optional: false,
                    required_by: gav.to_string(),
                })
            })
            .collect();
        queue.extend(self.spec_requirements.iter().cloned());

        let mut resolved: IndexMap<Gav, IndexSet<String>> = IndexMap::new();
        while let Some(requirement) = queue.pop_front() {
            if resolved
                .get(&requirement.gav)
                .is_some_and(|names| names.contains(&requirement.name))
            {
                continue;
            }
            if self
                .packs
                .get(&requirement.gav)
                .is_some_and(|p| p.is_excluded(&requirement.name))
            {
                if requirement.optional {
                    debug!(package = %requirement.name, gav = %requirement.gav, "skipping excluded optional package");
                    continue;
                }
                return Err(ProvisioningError::RequiredPackageExcluded {
                    gav: requirement.gav,
                    package: requirement.name,
                    required_by: requirement.required_by,
                });
            }

            let layout = index.layout(&requirement.gav)?;
            let Some(package) = layout.package(&requirement.name) else {
                return Err(ProvisioningError::PackageNotFound {
                    gav: requirement.gav,
                    package: requirement.name,
                });
            };

            let ctx = Context::Pack(requirement.gav.clone());
            for dependency in &package.deps {
                let gav = match &dependency.origin {
                    Some(origin) => index.resolve_origin(&ctx, origin)?,
                    None => requirement.gav.clone(),
                };
                queue.push_back(Requirement {
                    gav,
                    name: dependency.name.clone(),
                    optional: dependency.optional,
                    required_by: format!("{}#{}", requirement.gav, requirement.name),
                });
            }

            resolved
                .entry(requirement.gav)
                .or_default()
                .insert(requirement.name);
        }

        Ok(resolved
            .into_iter()
            .map(|(gav, names)| (gav, names.into_iter().collect()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolved::ResolvedPackageDependency;
    use fpack_spec::{FeatureSpec, PackageDependency, PackageSpec};
    use pretty_assertions::assert_eq;

    fn core() -> Gav {
        Gav::new("org", "core", "1")
    }

    fn app() -> Gav {
        Gav::new("org", "app", "1")
    }

    fn layouts() -> (FeaturePackLayout, FeaturePackLayout) {
        let core_layout = FeaturePackLayout::new(core())
            .with_package(PackageSpec::new("base"))
            .with_package(PackageSpec::new("docs"))
            .with_package(PackageSpec::new("jdbc").dep(PackageDependency::optional("docs")))
            .with_default_package("base");
        let app_layout = FeaturePackLayout::new(app())
            .with_dependency(FeaturePackConfig::new(core()).with_origin("core"))
            .with_package(PackageSpec::new("main").dep(PackageDependency::required("base").from_origin("core")))
            .with_package(PackageSpec::new("extras"))
            .with_default_package("main")
            .with_default_package("extras");
        (core_layout, app_layout)
    }

    fn index(core: &FeaturePackLayout, app: &FeaturePackLayout) -> SpecIndex {
        let mut index = SpecIndex::new();
        index.insert_pack(app.clone());
        index.insert_pack(core.clone());
        index.add_dependency(&app.gav().clone(), Some("core"), core.gav().clone());
        index
    }

    #[test]
    fn test_defaults_and_transitive_dependencies() {
        let (core_layout, app_layout) = layouts();
        let index = index(&core_layout, &app_layout);

        let mut resolver = PackageResolver::new();
        resolver.visit(&app_layout, &FeaturePackConfig::new(app()).exclude_package("extras"));
        resolver.visit(&core_layout, &FeaturePackConfig::new(core()).inherit_packages(false));

        let resolved = resolver.resolve(&index).unwrap();
        assert_eq!(resolved.get(&app()).unwrap(), &vec!["main".to_string()]);
        assert_eq!(resolved.get(&core()).unwrap(), &vec!["base".to_string()]);
    }

    #[test]
    fn test_spec_dependencies_and_optional_exclusion() {
        let (core_layout, app_layout) = layouts();
        let index = index(&core_layout, &app_layout);

        let mut resolver = PackageResolver::new();
        resolver.visit(
            &core_layout,
            &FeaturePackConfig::new(core()).exclude_package("docs"),
        );
        let spec = ResolvedFeatureSpec::new(
            ResolvedSpecId::new(app(), "ds"),
            FeatureSpec::new("ds"),
        )
        .with_package(ResolvedPackageDependency {
            gav: core(),
            name: "jdbc".to_string(),
            optional: false,
        });
        resolver.require_spec(&spec);
        resolver.require_spec(&spec);

        let resolved = resolver.resolve(&index).unwrap();
        assert_eq!(
            resolved.get(&core()).unwrap(),
            &vec!["base".to_string(), "jdbc".to_string()]
        );
    }

    #[test]
    fn test_required_dependency_on_excluded_package() {
        let (core_layout, app_layout) = layouts();
        let index = index(&core_layout, &app_layout);

        let mut resolver = PackageResolver::new();
        resolver.visit(&app_layout, &FeaturePackConfig::new(app()));
        resolver.visit(
            &core_layout,
            &FeaturePackConfig::new(core()).exclude_package("base"),
        );

        let err = resolver.resolve(&index).unwrap_err();
        assert!(matches!(
            err,
            ProvisioningError::RequiredPackageExcluded { ref package, .. } if package == "base"
        ));
    }

    #[test]
    fn test_unknown_package() {
        let (core_layout, app_layout) = layouts();
        let index = index(&core_layout, &app_layout);

        let mut resolver = PackageResolver::new();
        resolver.visit(
            &core_layout,
            &FeaturePackConfig::new(core()).include_package("missing"),
        );

        assert!(matches!(
            resolver.resolve(&index),
            Err(ProvisioningError::PackageNotFound { .. })
        ));
    }
}
