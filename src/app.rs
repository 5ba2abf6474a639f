// ============================================================================
// Structure : App
// ============================================================================
// Gère l'état global de l'application TUI
//
// CONCEPTS RUST :
// 1. State Management : centraliser l'état dans une seule structure
// 2. Mutabilité contrôlée : &mut self pour modifier l'état
// 3. Trait objects : &dyn CoinRow pour lister tendances OU résultats
//
// PATTERN : "Application State"
// - Tous les composants de l'UI lisent depuis App
// - Les résultats du worker et l'état du SyncCore sont recopiés ici
// ============================================================================

use crate::models::{Candle, CoinDetails, CoinRow, SearchCoin, TrendingCoin, WatchTarget};
use crate::sync::SessionState;

/// Nombre de coins tendance affichés
pub const TRENDING_SHOWN: usize = 6;

// ============================================================================
// Enums : Screen et Listing
// ============================================================================

/// Écrans de l'application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Écran d'accueil
    Home,

    /// Mode saisie (recherche) : les touches remplissent le buffer
    /// - Enter valide, ESC annule
    InputMode,
}

/// Contenu de la liste de gauche
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// Coins tendance
    Trending,
    /// Résultats de la recherche `query`
    Search { query: String },
}

/// État principal de l'application
pub struct App {
    /// Indique si l'application doit continuer à tourner
    pub running: bool,

    /// Écran actuellement affiché
    pub current_screen: Screen,

    /// Liste affichée (tendances ou recherche)
    pub listing: Listing,

    /// Coins tendance (déjà tronqués à TRENDING_SHOWN)
    pub trending: Vec<TrendingCoin>,

    /// Derniers résultats de recherche
    pub search_results: Vec<SearchCoin>,

    /// Index sélectionné dans la liste courante
    pub selected_index: usize,

    /// Vue d'ensemble du coin par défaut
    pub overview: Option<CoinDetails>,

    /// Plage OHLC du jour pour ce coin (agrégée sur les chandelles 24h)
    pub today_range: Option<Candle>,

    /// Copie du dernier état de la session live
    pub live: SessionState,

    /// Coin dont le pool est en cours de résolution
    pub pending_watch: Option<String>,

    /// Two-step quit : première pression de 'q' = confirmation demandée
    pub confirm_quit: bool,

    /// Indique si des données sont en cours de chargement
    pub is_loading: bool,

    /// Message de chargement optionnel
    pub loading_message: Option<String>,

    /// Dernier message d'erreur à afficher
    pub status_message: Option<String>,

    /// Buffer de saisie pour le mode Input
    pub input_buffer: String,

    /// Prompt affiché en mode Input
    pub input_prompt: String,
}

impl App {
    pub fn new() -> Self {
        Self {
            running: true,
            current_screen: Screen::Home,
            listing: Listing::Trending,
            trending: Vec::new(),
            search_results: Vec::new(),
            selected_index: 0,
            overview: None,
            today_range: None,
            live: SessionState::default(),
            pending_watch: None,
            confirm_quit: false,
            is_loading: false,
            loading_message: None,
            status_message: None,
            input_buffer: String::new(),
            input_prompt: String::new(),
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    // ========================================================================
    // Liste et navigation
    // ========================================================================

    /// Lignes de la liste courante
    ///
    /// CONCEPT RUST : Vec<&dyn Trait>
    /// - TrendingCoin et SearchCoin sont des types différents
    /// - Le trait CoinRow les unifie pour le rendu et la sélection
    pub fn rows(&self) -> Vec<&dyn CoinRow> {
        match self.listing {
            Listing::Trending => self.trending.iter().map(|c| c as &dyn CoinRow).collect(),
            Listing::Search { .. } => self
                .search_results
                .iter()
                .map(|c| c as &dyn CoinRow)
                .collect(),
        }
    }

    pub fn row_count(&self) -> usize {
        match self.listing {
            Listing::Trending => self.trending.len(),
            Listing::Search { .. } => self.search_results.len(),
        }
    }

    /// Navigue vers le haut (saturating_sub : jamais sous 0)
    pub fn navigate_up(&mut self) {
        self.selected_index = self.selected_index.saturating_sub(1);
    }

    /// Navigue vers le bas, borné au dernier élément
    pub fn navigate_down(&mut self) {
        let max_index = self.row_count().saturating_sub(1);
        self.selected_index = (self.selected_index + 1).min(max_index);
    }

    /// Identifiant du coin sélectionné
    pub fn selected_coin_id(&self) -> Option<String> {
        self.rows()
            .get(self.selected_index)
            .map(|row| row.id().to_string())
    }

    /// Remplace les tendances (seules les TRENDING_SHOWN premières sont gardées)
    pub fn set_trending(&mut self, mut coins: Vec<TrendingCoin>) {
        coins.truncate(TRENDING_SHOWN);
        self.trending = coins;
        self.clamp_selection();
    }

    /// Affiche les résultats d'une recherche
    pub fn set_search_results(&mut self, query: String, results: Vec<SearchCoin>) {
        if results.is_empty() {
            self.status_message = Some(format!("Aucun résultat pour \"{}\"", query));
        } else {
            self.status_message = None;
        }
        self.search_results = results;
        self.listing = Listing::Search { query };
        self.selected_index = 0;
    }

    /// Retour à la liste des tendances
    pub fn show_trending(&mut self) {
        self.listing = Listing::Trending;
        self.selected_index = 0;
    }

    pub fn is_on_search_results(&self) -> bool {
        matches!(self.listing, Listing::Search { .. })
    }

    fn clamp_selection(&mut self) {
        let max_index = self.row_count().saturating_sub(1);
        self.selected_index = self.selected_index.min(max_index);
    }

    // ========================================================================
    // Vue d'ensemble et session live
    // ========================================================================

    /// Enregistre la vue d'ensemble et la plage du jour
    pub fn set_overview(&mut self, details: CoinDetails, candles: &[Candle]) {
        self.overview = Some(details);
        self.today_range = day_range(candles);
    }

    /// Recopie l'état publié par le SyncCore
    pub fn update_live(&mut self, state: SessionState) {
        self.live = state;
    }

    /// Cible actuellement observée
    pub fn watching(&self) -> Option<&WatchTarget> {
        self.live.target.as_ref()
    }

    /// Marque un coin en attente de résolution de pool
    pub fn begin_watch(&mut self, coin_id: String) {
        self.status_message = None;
        self.pending_watch = Some(coin_id);
    }

    /// Consomme l'attente si elle concerne `coin_id`
    ///
    /// Une réponse pour un coin qui n'est plus attendu (l'utilisateur a
    /// sélectionné autre chose entre-temps) est ignorée.
    pub fn finish_watch(&mut self, coin_id: &str) -> bool {
        if self.pending_watch.as_deref() == Some(coin_id) {
            self.pending_watch = None;
            true
        } else {
            false
        }
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
    }

    // ========================================================================
    // Confirmation de quit
    // ========================================================================

    pub fn request_quit(&mut self) {
        self.confirm_quit = true;
    }

    pub fn cancel_quit(&mut self) {
        self.confirm_quit = false;
    }

    pub fn is_awaiting_quit_confirmation(&self) -> bool {
        self.confirm_quit
    }

    // ========================================================================
    // Chargement
    // ========================================================================

    pub fn start_loading(&mut self, message: Option<String>) {
        self.is_loading = true;
        self.loading_message = message;
    }

    pub fn stop_loading(&mut self) {
        self.is_loading = false;
        self.loading_message = None;
    }

    // ========================================================================
    // Input Mode Management
    // ========================================================================

    /// Entre en mode input avec un prompt donné
    pub fn start_input(&mut self, prompt: String) {
        self.current_screen = Screen::InputMode;
        self.input_buffer.clear();
        self.input_prompt = prompt;
    }

    pub fn cancel_input(&mut self) {
        self.current_screen = Screen::Home;
        self.input_buffer.clear();
        self.input_prompt.clear();
    }

    /// Récupère la valeur saisie et retourne à l'accueil
    pub fn submit_input(&mut self) -> String {
        let value = std::mem::take(&mut self.input_buffer);
        self.current_screen = Screen::Home;
        self.input_prompt.clear();
        value
    }

    pub fn append_char(&mut self, c: char) {
        self.input_buffer.push(c);
    }

    pub fn backspace(&mut self) {
        self.input_buffer.pop();
    }

    pub fn is_in_input_mode(&self) -> bool {
        self.current_screen == Screen::InputMode
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Agrège des chandelles en une seule : open du premier, close du dernier,
/// plus haut et plus bas sur l'ensemble
pub fn day_range(candles: &[Candle]) -> Option<Candle> {
    let first = candles.first()?;
    let last = candles.last()?;

    let high = candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);

    Some(Candle::new(first.timestamp_ms, first.open, high, low, last.close))
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn trending(id: &str) -> TrendingCoin {
        TrendingCoin {
            id: id.to_string(),
            name: id.to_uppercase(),
            symbol: id[..3].to_uppercase(),
            thumb: None,
            price: None,
            change_24h: 0.0,
        }
    }

    fn search(id: &str) -> SearchCoin {
        SearchCoin {
            id: id.to_string(),
            name: id.to_string(),
            symbol: id.to_string(),
            thumb: None,
            change_24h: 1.5,
        }
    }

    #[test]
    fn test_app_creation() {
        let app = App::new();
        assert!(app.is_running());
        assert!(app.trending.is_empty());
        assert_eq!(app.listing, Listing::Trending);
        assert!(app.watching().is_none());
    }

    #[test]
    fn test_trending_is_truncated() {
        let mut app = App::new();
        let coins = ["bitcoin", "ethereum", "solana", "dogecoin", "cardano", "polkadot", "tron", "litecoin"]
            .iter()
            .map(|id| trending(id))
            .collect();
        app.set_trending(coins);
        assert_eq!(app.trending.len(), TRENDING_SHOWN);
    }

    #[test]
    fn test_navigation() {
        let mut app = App::new();
        app.set_trending(vec![trending("bitcoin"), trending("ethereum"), trending("solana")]);

        app.navigate_down();
        app.navigate_down();
        app.navigate_down();
        assert_eq!(app.selected_index, 2);
        assert_eq!(app.selected_coin_id().as_deref(), Some("solana"));

        app.navigate_up();
        app.navigate_up();
        app.navigate_up();
        assert_eq!(app.selected_index, 0);
    }

    #[test]
    fn test_search_then_back_to_trending() {
        let mut app = App::new();
        app.set_trending(vec![trending("bitcoin")]);
        app.set_search_results("pepe".to_string(), vec![search("pepe"), search("pepe-2")]);

        assert!(app.is_on_search_results());
        app.navigate_down();
        assert_eq!(app.selected_coin_id().as_deref(), Some("pepe-2"));

        app.show_trending();
        assert_eq!(app.selected_coin_id().as_deref(), Some("bitcoin"));
    }

    #[test]
    fn test_empty_search_sets_status() {
        let mut app = App::new();
        app.set_search_results("zzz".to_string(), Vec::new());
        assert!(app.status_message.as_deref().unwrap_or("").contains("zzz"));
        assert_eq!(app.selected_coin_id(), None);
    }

    #[test]
    fn test_finish_watch_ignores_stale_coin() {
        let mut app = App::new();
        app.begin_watch("bitcoin".to_string());
        app.begin_watch("ethereum".to_string());

        assert!(!app.finish_watch("bitcoin"));
        assert!(app.finish_watch("ethereum"));
        assert!(app.pending_watch.is_none());
    }

    #[test]
    fn test_input_mode() {
        let mut app = App::new();
        app.start_input("Search: ".to_string());
        assert!(app.is_in_input_mode());

        for c in "solx".chars() {
            app.append_char(c);
        }
        app.backspace();
        assert_eq!(app.submit_input(), "sol");
        assert!(!app.is_in_input_mode());
        assert!(app.input_buffer.is_empty());
    }

    #[test]
    fn test_day_range() {
        let candles = vec![
            Candle::new(1_000, 100.0, 105.0, 98.0, 104.0),
            Candle::new(2_000, 104.0, 112.0, 101.0, 110.0),
            Candle::new(3_000, 110.0, 111.0, 95.0, 99.0),
        ];
        let range = day_range(&candles).unwrap();
        assert_eq!(range.to_array(), [1_000.0, 100.0, 112.0, 95.0, 99.0]);
        assert!(day_range(&[]).is_none());
    }
}
