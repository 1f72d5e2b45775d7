use annuaire::config::{SiteDescriptor, Strategy};
use annuaire::fetch::{ClientConfig, HttpFetcher};
use annuaire::pipeline::{Pipeline, RunOptions, RunOutcome};
use mockito::{Matcher, Mock, Server};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

const PAGE_1: &str = r#"<nav><a href="/">Accueil</a></nav>
<a class="fiche" href="/avocat/1">DUPONT Jean</a>
<a class="fiche" href="/avocat/2">MULLER Christian</a>"#;

const PAGE_2: &str = r#"<a class="fiche" href="/avocat/3">DE LEPINAU Hervé</a>
<a class="fiche" href="/avocat/4">Jean DUPONT</a>
<a class="fiche" href="/avocat/1">DUPONT Jean</a>"#;

// nothing new: the walk stops here
const PAGE_3: &str = r#"<a class="fiche" href="/avocat/2">MULLER Christian</a>"#;

const LETTER: &str = r#"<a class="fiche" href="/avocat/1">DUPONT Jean</a>"#;

const DUPONT: &str = r#"<html><body><h1>Me Jean DUPONT</h1>
<p>12 rue Gambetta<br>62000 ARRAS</p>
<p>Tél : 03 21 00 00 01</p>
<p><a href="mailto:j.dupont@cabinet-dupont.fr">j.dupont@cabinet-dupont.fr</a></p>
<p>Date de serment : 12/01/2005</p></body></html>"#;

// same lawyer under a second URL, adding a fax
const DUPONT_MIRROR: &str = r#"<html><body><h1>Jean DUPONT</h1>
<p>Fax : 03 21 00 00 09</p>
<p><a href="mailto:J.Dupont@cabinet-dupont.fr">écrire</a></p></body></html>"#;

const MULLER: &str = r#"<html><body><h1>MULLERChristian</h1>
<p>3 place des Héros 62000 ARRAS</p>
<p><a href="mailto:c.muller@muller-avocat.fr">mail</a></p></body></html>"#;

const LEPINAU: &str = r#"<html><body><h1>DE LEPINAU Hervé</h1>
<p>Téléphone : 03.21.00.00.03</p></body></html>"#;

struct Directory {
    mocks: Vec<Mock>,
}

impl Directory {
    /// Mock a directory where every resource is requested `runs` times
    async fn serve(server: &mut Server, runs: usize) -> Self {
        let mut mocks = Vec::new();
        for (page, body) in [("1", PAGE_1), ("2", PAGE_2), ("3", PAGE_3)] {
            mocks.push(
                server
                    .mock("GET", "/annuaire")
                    .match_query(Matcher::UrlEncoded("page".into(), page.into()))
                    .with_status(200)
                    .with_header("content-type", "text/html; charset=utf-8")
                    .with_body(body)
                    .expect(runs)
                    .create_async()
                    .await,
            );
        }
        mocks.push(
            server
                .mock("GET", Matcher::Regex(r"^/lettre/[A-Z]$".to_string()))
                .with_status(200)
                .with_body(LETTER)
                .expect(26 * runs)
                .create_async()
                .await,
        );
        for (id, body) in [("1", DUPONT), ("2", MULLER), ("3", LEPINAU), ("4", DUPONT_MIRROR)] {
            mocks.push(
                server
                    .mock("GET", format!("/avocat/{}", id).as_str())
                    .with_status(200)
                    .with_header("content-type", "text/html; charset=utf-8")
                    .with_body(body)
                    .expect(runs)
                    .create_async()
                    .await,
            );
        }
        Self { mocks }
    }

    async fn assert(&self) {
        for mock in &self.mocks {
            mock.assert_async().await;
        }
    }
}

fn site(server: &Server) -> SiteDescriptor {
    let mut site = SiteDescriptor::new("mock", format!("{}/annuaire", server.url()));
    site.strategies = vec![Strategy::Paginated, Strategy::Alphabetical];
    site.listing.url_template = Some(format!("{}/annuaire?page={{page}}", server.url()));
    site.alphabet_url_template = Some(format!("{}/lettre/{{letter}}", server.url()));
    site.selectors.profile_link = Some("a.fiche".to_string());
    site.polite_delay_seconds = 0.0;
    site.validate().unwrap();
    site
}

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(ClientConfig {
        timeout: 5,
        max_retries: 1,
        retry_base_delay: 1,
        polite_delay: Duration::ZERO,
        ..Default::default()
    })
    .unwrap()
}

async fn harvest(site: &SiteDescriptor, dir: &TempDir) -> RunOutcome {
    let fetcher = fetcher();
    let options = RunOptions {
        output_dir: dir.path().to_path_buf(),
        quiet: true,
        ..Default::default()
    };
    Pipeline::new(site, &fetcher, options).run().await.unwrap()
}

#[tokio::test]
async fn test_profile_reached_twice_is_fetched_once() {
    let mut server = Server::new_async().await;
    let directory = Directory::serve(&mut server, 1).await;
    let site = site(&server);
    let temp = TempDir::new().unwrap();

    let outcome = harvest(&site, &temp).await;
    directory.assert().await;

    let urls: HashSet<_> = outcome.records.iter().map(|r| r.profile_url.clone()).collect();
    assert_eq!(urls.len(), outcome.records.len());
    assert_eq!(outcome.report.profiles_discovered, 4);
    assert!(outcome.report.skipped.is_empty());
}

#[tokio::test]
async fn test_records_are_deduplicated_by_email() {
    let mut server = Server::new_async().await;
    let _directory = Directory::serve(&mut server, 1).await;
    let site = site(&server);
    let temp = TempDir::new().unwrap();

    let outcome = harvest(&site, &temp).await;

    let names: Vec<_> = outcome.records.iter().map(|r| r.family_name.clone()).collect();
    assert_eq!(names, vec!["DUPONT", "MULLER", "DE LEPINAU"]);

    let dupont = &outcome.records[0];
    assert_eq!(dupont.profile_url, format!("{}/avocat/1", server.url()));
    assert_eq!(dupont.fax, "03.21.00.00.09");
    assert!(dupont
        .notes
        .iter()
        .any(|n| n == &format!("profile_url: {}/avocat/4", server.url())));

    let emails: Vec<_> = outcome
        .records
        .iter()
        .filter(|r| !r.email.is_empty())
        .map(|r| r.email.to_lowercase())
        .collect();
    let unique: HashSet<_> = emails.iter().collect();
    assert_eq!(unique.len(), emails.len());
}

#[tokio::test]
async fn test_exports_are_written() {
    let mut server = Server::new_async().await;
    let _directory = Directory::serve(&mut server, 1).await;
    let site = site(&server);
    let temp = TempDir::new().unwrap();

    let outcome = harvest(&site, &temp).await;
    let paths = outcome.paths.clone();
    assert!(outcome.into_result().is_ok());

    let name = paths.csv.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("mock_3_"), "{}", name);

    let csv = fs::read(&paths.csv).unwrap();
    assert!(csv.starts_with(b"\xEF\xBB\xBF"));
    let csv = String::from_utf8(csv[3..].to_vec()).unwrap();
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.lines().next().unwrap().starts_with("given_name;family_name;"));

    assert_eq!(
        fs::read_to_string(&paths.emails).unwrap(),
        "c.muller@muller-avocat.fr\nj.dupont@cabinet-dupont.fr\n"
    );
    assert_eq!(
        fs::read_to_string(&paths.vcard)
            .unwrap()
            .matches("BEGIN:VCARD")
            .count(),
        3
    );
    let report = fs::read_to_string(&paths.report).unwrap();
    assert!(report.contains("ARRAS"));
    assert!(report.contains("Profiles discovered: 4"));
}

#[tokio::test]
async fn test_two_runs_produce_the_same_json() {
    let mut server = Server::new_async().await;
    let _directory = Directory::serve(&mut server, 2).await;
    let site = site(&server);
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();

    let first = harvest(&site, &first_dir).await;
    let second = harvest(&site, &second_dir).await;

    let load = |outcome: &RunOutcome| {
        let text = fs::read_to_string(&outcome.paths.json).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&text).unwrap();
        for record in value.as_array_mut().unwrap() {
            record
                .as_object_mut()
                .unwrap()
                .remove("extraction_timestamp");
        }
        value
    };
    assert_eq!(load(&first), load(&second));
}
