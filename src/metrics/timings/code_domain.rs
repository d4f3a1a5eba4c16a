//! File-domain classification of changes (frontend, backend, test, ...).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::diff::language::extension_of;
use crate::engine::week::week_key;
use crate::git::CommitRecord;
use crate::metrics::Metric;

/// One domain's match rules. Checked in order: extension, exact filename,
/// path fragment, regex. The first domain that matches wins.
struct DomainRule {
    name: &'static str,
    extensions: &'static [&'static str],
    files: &'static [&'static str],
    paths: &'static [&'static str],
    patterns: Vec<Regex>,
}

fn regexes(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
}

static DOMAIN_RULES: LazyLock<Vec<DomainRule>> = LazyLock::new(|| {
    vec![
        DomainRule {
            name: "frontend",
            extensions: &[
                "js", "jsx", "ts", "tsx", "mjs", "cjs", "html", "htm", "xhtml", "css", "scss",
                "sass", "less", "styl", "vue", "svelte", "astro", "hbs", "handlebars",
                "mustache", "ejs", "pug", "jade",
            ],
            files: &[
                "webpack.config.js",
                "vite.config.js",
                "rollup.config.js",
                "next.config.js",
                "nuxt.config.js",
                "babel.config.js",
                "postcss.config.js",
                "tailwind.config.js",
            ],
            paths: &[
                "frontend/", "client/", "web/", "www/", "public/", "static/", "assets/",
                "src/components/", "src/views/", "src/pages/", "src/layouts/", "components/",
                "views/", "pages/", "layouts/", "styles/", "css/", "scss/",
            ],
            patterns: Vec::new(),
        },
        DomainRule {
            name: "backend",
            extensions: &[
                "py", "pyw", "pyx", "java", "scala", "kt", "kts", "groovy", "gradle", "cs",
                "vb", "fs", "fsx", "fsi", "go", "rb", "rake", "gemspec", "php", "phtml", "rs",
                "c", "cpp", "cxx", "cc", "h", "hpp", "hxx", "hh", "m", "mm", "pl", "pm",
                "lua", "ex", "exs", "erl", "hrl", "hs", "lhs", "clj", "cljs", "cljc", "edn",
                "ml", "mli", "cr", "nim", "zig",
            ],
            files: &[
                "app.py",
                "main.py",
                "server.py",
                "api.py",
                "wsgi.py",
                "asgi.py",
                "main.go",
                "server.go",
                "Application.java",
                "Program.cs",
                "Startup.cs",
                "app.rb",
                "server.rb",
                "main.rs",
                "lib.rs",
                "index.php",
            ],
            paths: &[
                "backend/", "server/", "api/", "service/", "services/", "src/controllers/",
                "src/models/", "src/services/", "src/handlers/", "controllers/", "models/",
                "handlers/", "middleware/", "lib/", "libs/", "pkg/",
            ],
            patterns: Vec::new(),
        },
        DomainRule {
            name: "database",
            extensions: &["sql", "mysql", "psql", "sqlite", "db", "cql", "cypher", "sparql", "prisma", "dbml"],
            files: &["schema.sql", "migration.sql", "seed.sql", "init.sql", "schema.prisma", "db.sqlite3"],
            paths: &["migrations/", "db/", "database/", "schema/", "sql/", "src/migrations/", "src/db/"],
            patterns: Vec::new(),
        },
        DomainRule {
            name: "test",
            extensions: &["feature", "story"],
            files: &[
                "jest.config.js",
                "vitest.config.js",
                "karma.conf.js",
                "cypress.config.js",
                "playwright.config.js",
                "pytest.ini",
                "tox.ini",
                "conftest.py",
            ],
            paths: &[
                "test/", "tests/", "__tests__/", "spec/", "specs/", "src/test/", "src/tests/",
                "testing/", "e2e/", "cypress/", "playwright/", "__mocks__/",
            ],
            patterns: regexes(&[
                r"test_[^/]*\.py$",
                r"_test\.py$",
                r"_test\.go$",
                r"\.test\.[jt]sx?$",
                r"\.spec\.[jt]sx?$",
                r"Tests?\.java$",
                r"Tests?\.cs$",
                r"_spec\.rb$",
                r"_test\.rb$",
            ]),
        },
        DomainRule {
            name: "docs",
            extensions: &["md", "markdown", "rst", "txt", "adoc", "asciidoc", "org", "tex", "wiki"],
            files: &["README.md", "CHANGELOG.md", "CONTRIBUTING.md", "LICENSE", "SECURITY.md", "AUTHORS"],
            paths: &["docs/", "doc/", "documentation/", "wiki/", "guides/", "manual/", "help/"],
            patterns: Vec::new(),
        },
        DomainRule {
            name: "config",
            extensions: &[
                "json", "yaml", "yml", "toml", "ini", "cfg", "conf", "xml", "plist",
                "properties", "env", "envrc", "lock", "sum", "mod",
            ],
            files: &[
                "package.json",
                "tsconfig.json",
                "setup.py",
                "pyproject.toml",
                "requirements.txt",
                "pom.xml",
                "build.gradle",
                "Cargo.toml",
                "go.mod",
                "composer.json",
                "Gemfile",
                ".gitignore",
                ".editorconfig",
                "Makefile",
                "CMakeLists.txt",
            ],
            paths: &["config/", "configs/", "configuration/", ".github/", ".circleci/", ".gitlab/", "ci/"],
            patterns: Vec::new(),
        },
        DomainRule {
            name: "mobile",
            extensions: &["swift", "dart", "xaml"],
            files: &["Info.plist", "AndroidManifest.xml", "pubspec.yaml", "Package.swift", "project.pbxproj"],
            paths: &["ios/", "android/", "mobile/", "app/", "src/ios/", "src/android/", "platforms/"],
            patterns: Vec::new(),
        },
        DomainRule {
            name: "devops",
            extensions: &["sh", "bash", "zsh", "fish", "ps1", "bat", "cmd", "tf", "tfvars", "hcl", "jenkinsfile"],
            files: &[
                "Dockerfile",
                "docker-compose.yml",
                "docker-compose.yaml",
                "Jenkinsfile",
                ".gitlab-ci.yml",
                ".travis.yml",
                "azure-pipelines.yml",
                "Vagrantfile",
                "main.tf",
                "variables.tf",
            ],
            paths: &[
                ".github/workflows/", "scripts/", "bin/", "deploy/", "deployment/",
                "infrastructure/", "terraform/", "ansible/", "k8s/", "kubernetes/", "helm/",
                "charts/", "docker/",
            ],
            patterns: Vec::new(),
        },
        DomainRule {
            name: "data_science",
            extensions: &["ipynb", "r", "rmd"],
            files: &["environment.yml", "conda.yml"],
            paths: &["notebooks/", "analysis/", "experiments/", "research/", "analytics/"],
            patterns: Vec::new(),
        },
        DomainRule {
            name: "machine_learning",
            extensions: &["pkl", "pickle", "h5", "pb", "onnx"],
            files: &["model.py", "train.py", "inference.py", "pipeline.py"],
            paths: &["models/", "ml/", "ai/", "training/", "inference/", "pipelines/", "features/"],
            patterns: Vec::new(),
        },
        DomainRule {
            name: "game_dev",
            extensions: &["gd", "tres", "tscn"],
            files: &["project.godot", "Assembly-CSharp.csproj"],
            paths: &["Assets/", "Scripts/", "Scenes/", "Prefabs/", "Content/", "game/", "engine/"],
            patterns: Vec::new(),
        },
    ]
});

/// Classifies a path into a domain; the first matching rule wins, files
/// matching nothing land in `other`.
pub fn classify_domain(filepath: &str) -> &'static str {
    let filepath = filepath.replace('\\', "/");
    let filename = filepath.rsplit('/').next().unwrap_or(&filepath);
    let ext = extension_of(filename);

    for rule in DOMAIN_RULES.iter() {
        if let Some(ext) = &ext {
            if rule.extensions.contains(&ext.as_str()) {
                return rule.name;
            }
        }
        if rule.files.contains(&filename) {
            return rule.name;
        }
        if rule.paths.iter().any(|p| filepath.contains(p)) {
            return rule.name;
        }
        if rule.patterns.iter().any(|p| p.is_match(&filepath)) {
            return rule.name;
        }
    }
    "other"
}

#[derive(Debug, Default)]
struct DeveloperState {
    total_by_domain: BTreeMap<String, u64>,
    weekly: BTreeMap<String, BTreeMap<String, u64>>,
}

/// Attributes `added + deleted` lines of every file to its domain.
#[derive(Debug, Default)]
pub struct CodeDomain {
    developers: BTreeMap<String, DeveloperState>,
}

/// One developer-week of domain figures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WeeklyDomains {
    /// `domain → changed lines`.
    pub domains: BTreeMap<String, u64>,
    /// Sum over domains.
    pub total_changes: u64,
    /// `domain → share of the week's changes` in percent.
    pub percentages: BTreeMap<String, f64>,
}

/// One developer's domain record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeveloperDomains {
    /// `domain → changed lines` across the bucket.
    pub total_by_domain: BTreeMap<String, u64>,
    /// `domain → share of all changes` in percent.
    pub domain_percentages: BTreeMap<String, f64>,
    /// Weekly breakdown keyed by Monday date.
    pub weekly_domains: BTreeMap<String, WeeklyDomains>,
}

/// Snapshot: `canonical email → domain record`.
pub type CodeDomainSnapshot = BTreeMap<String, DeveloperDomains>;

impl Metric for CodeDomain {
    type Snapshot = CodeDomainSnapshot;

    fn process_commit(&mut self, commit: &CommitRecord) {
        let developer = commit.author_key();
        let week = week_key(commit.committer_date);

        for mf in &commit.modified_files {
            let changes = mf.added_lines + mf.deleted_lines;
            if changes == 0 {
                continue;
            }
            let domain = classify_domain(mf.path()).to_string();
            let state = self.developers.entry(developer.clone()).or_default();
            *state.total_by_domain.entry(domain.clone()).or_insert(0) += changes;
            *state
                .weekly
                .entry(week.clone())
                .or_default()
                .entry(domain)
                .or_insert(0) += changes;
        }
    }

    fn snapshot(&self) -> CodeDomainSnapshot {
        self.developers
            .iter()
            .map(|(dev, state)| {
                (
                    dev.clone(),
                    build_record(state.total_by_domain.clone(), state.weekly.clone()),
                )
            })
            .collect()
    }
}

fn build_record(
    total_by_domain: BTreeMap<String, u64>,
    weekly: BTreeMap<String, BTreeMap<String, u64>>,
) -> DeveloperDomains {
    let total: u64 = total_by_domain.values().sum();
    let domain_percentages = if total > 0 {
        total_by_domain
            .iter()
            .map(|(domain, count)| (domain.clone(), *count as f64 / total as f64 * 100.0))
            .collect()
    } else {
        BTreeMap::new()
    };

    let weekly_domains = weekly
        .into_iter()
        .filter_map(|(week, domains)| {
            let week_total: u64 = domains.values().sum();
            if week_total == 0 {
                return None;
            }
            let percentages = domains
                .iter()
                .map(|(domain, count)| (domain.clone(), *count as f64 / week_total as f64 * 100.0))
                .collect();
            Some((
                week,
                WeeklyDomains {
                    domains,
                    total_changes: week_total,
                    percentages,
                },
            ))
        })
        .collect();

    DeveloperDomains {
        total_by_domain,
        domain_percentages,
        weekly_domains,
    }
}

impl CodeDomain {
    /// Merges chunk snapshots: raw counts sum, percentages recomputed.
    pub fn merge(parts: &[CodeDomainSnapshot]) -> CodeDomainSnapshot {
        let mut totals: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
        let mut weekly: BTreeMap<String, BTreeMap<String, BTreeMap<String, u64>>> = BTreeMap::new();

        for part in parts {
            for (dev, record) in part {
                let dev_totals = totals.entry(dev.clone()).or_default();
                for (domain, count) in &record.total_by_domain {
                    *dev_totals.entry(domain.clone()).or_insert(0) += count;
                }
                let dev_weekly = weekly.entry(dev.clone()).or_default();
                for (week, week_record) in &record.weekly_domains {
                    let week_map = dev_weekly.entry(week.clone()).or_default();
                    for (domain, count) in &week_record.domains {
                        *week_map.entry(domain.clone()).or_insert(0) += count;
                    }
                }
            }
        }

        totals
            .into_iter()
            .map(|(dev, dev_totals)| {
                let dev_weekly = weekly.remove(&dev).unwrap_or_default();
                (dev, build_record(dev_totals, dev_weekly))
            })
            .collect()
    }
}
