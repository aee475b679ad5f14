//! Playlist tree reconstruction
//!
//! Engine keeps order in foreign keys: sibling playlists form a singly linked
//! list through `nextListId`, tracks inside a playlist through
//! `nextEntityId`, and nesting through `parentListId`. A zero (or NULL) link
//! terminates a chain. The rows are walked once here and turned into a
//! [`Playlist`] forest; nothing downstream looks at the links again.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use tracing::{debug, info, warn};

use super::{PlaylistEntityRow, PlaylistRow, SmartlistRow};
use crate::error::{Error, Result};
use crate::library::Playlist;

/// A row that is one element of a singly linked list.
pub trait Linked {
    type Key: Eq + Hash + Clone + Debug;

    fn key(&self) -> Self::Key;

    /// `None` terminates the chain.
    fn next(&self) -> Option<Self::Key>;
}

impl Linked for PlaylistRow {
    type Key = i64;

    fn key(&self) -> i64 {
        self.id.unwrap_or(0)
    }

    fn next(&self) -> Option<i64> {
        self.next_list_id.filter(|&next| next != 0)
    }
}

impl Linked for SmartlistRow {
    type Key = String;

    fn key(&self) -> String {
        self.list_uuid.clone().unwrap_or_default()
    }

    fn next(&self) -> Option<String> {
        self.next_list_uuid.clone().filter(|next| !next.is_empty())
    }
}

/// The element no other element of `set` points at.
///
/// If corrupt data leaves several candidates, the first in row order wins.
pub fn find_head<T: Linked>(set: &[T]) -> Result<&T> {
    let referenced: HashSet<T::Key> = set.iter().filter_map(Linked::next).collect();
    let mut heads = set.iter().filter(|item| !referenced.contains(&item.key()));

    let head = heads.next().ok_or_else(|| {
        Error::NotFound(format!("list head among {} linked rows", set.len()))
    })?;

    let extra = heads.count();
    if extra > 0 {
        warn!(
            "Found {} list heads, using {:?}",
            extra + 1,
            head.key()
        );
    }
    Ok(head)
}

/// Order `set` by following its links from the head.
///
/// The walk is bounded by the size of the set, so a cycle or a dangling link
/// fails instead of looping or silently dropping elements.
pub fn linearize<T: Linked>(set: &[T]) -> Result<Vec<&T>> {
    if set.is_empty() {
        return Ok(Vec::new());
    }

    let by_key: HashMap<T::Key, &T> = set.iter().map(|item| (item.key(), item)).collect();
    let mut visited = HashSet::with_capacity(set.len());
    let mut ordered = Vec::with_capacity(set.len());

    let mut current = find_head(set)?;
    loop {
        if !visited.insert(current.key()) {
            return Err(Error::NotFound(format!(
                "end of list, {:?} is linked twice",
                current.key()
            )));
        }
        ordered.push(current);
        if ordered.len() == set.len() {
            break;
        }

        let next = current.next().ok_or_else(|| {
            Error::NotFound(format!(
                "{} more linked rows after {:?}",
                set.len() - ordered.len(),
                current.key()
            ))
        })?;
        current = by_key.get(&next).copied().ok_or_else(|| {
            Error::NotFound(format!("row {:?} linked from {:?}", next, current.key()))
        })?;
    }

    Ok(ordered)
}

/// Track IDs of one playlist in play order.
///
/// Inconsistent data may leave several chains; each is walked from its head
/// in row order. Entries only reachable through a cycle are dropped.
pub fn order_entries(entries: &[&PlaylistEntityRow]) -> Vec<i64> {
    let by_id: HashMap<i64, &PlaylistEntityRow> = entries
        .iter()
        .filter_map(|e| e.id.map(|id| (id, *e)))
        .collect();
    let referenced: HashSet<i64> = entries
        .iter()
        .filter_map(|e| e.next_entity_id)
        .filter(|&next| next != 0)
        .collect();

    let mut visited = HashSet::with_capacity(entries.len());
    let mut tracks = Vec::with_capacity(entries.len());

    let heads = entries
        .iter()
        .filter(|e| e.id.map_or(true, |id| !referenced.contains(&id)));
    for head in heads {
        let mut current = Some(*head);
        while let Some(entry) = current {
            if let Some(id) = entry.id {
                if !visited.insert(id) {
                    break;
                }
            }
            if let Some(track_id) = entry.track_id {
                tracks.push(track_id);
            }
            current = entry
                .next_entity_id
                .filter(|&next| next != 0)
                .and_then(|next| by_id.get(&next).copied());
        }
    }

    let unreached = by_id.len().saturating_sub(visited.len());
    if unreached > 0 {
        warn!("Dropped {} playlist entries caught in a cycle", unreached);
    }

    tracks
}

/// Rebuild the playlist forest from flat rows.
///
/// Each playlist's `songs` holds its own tracks followed by the tracks of its
/// sub-playlists in child order. Any broken link fails the whole tree.
pub fn build_tree(rows: &[PlaylistRow], entries: &[PlaylistEntityRow]) -> Result<Vec<Playlist>> {
    let mut ids = HashSet::with_capacity(rows.len());
    for row in rows {
        let id = row
            .id
            .ok_or_else(|| Error::Parse(format!("playlist row {:?} has no id", row.title)))?;
        if id == 0 || !ids.insert(id) {
            return Err(Error::Parse(format!("playlist id {} is reserved or repeated", id)));
        }
    }

    let mut children: HashMap<i64, Vec<PlaylistRow>> = HashMap::new();
    for row in rows {
        let parent = row.parent_list_id.unwrap_or(0);
        if parent != 0 && !ids.contains(&parent) {
            return Err(Error::NotFound(format!("parent playlist {}", parent)).for_playlist(row.key()));
        }
        children.entry(parent).or_default().push(row.clone());
    }

    let mut entries_by_list: HashMap<i64, Vec<&PlaylistEntityRow>> = HashMap::new();
    for entry in entries {
        if let Some(list_id) = entry.list_id {
            entries_by_list.entry(list_id).or_default().push(entry);
        }
    }

    let mut placed = 0;
    let forest = place_children(0, &children, &entries_by_list, &mut placed)?;

    if placed != rows.len() {
        return Err(Error::NotFound(format!(
            "root for {} playlists with cyclic parents",
            rows.len() - placed
        )));
    }

    info!("Reconstructed {} playlists", placed);
    Ok(forest)
}

fn place_children(
    parent: i64,
    children: &HashMap<i64, Vec<PlaylistRow>>,
    entries: &HashMap<i64, Vec<&PlaylistEntityRow>>,
    placed: &mut usize,
) -> Result<Vec<Playlist>> {
    let siblings = match children.get(&parent) {
        Some(siblings) => siblings,
        None => return Ok(Vec::new()),
    };

    let ordered = linearize(siblings).map_err(|e| match parent {
        0 => e,
        _ => e.for_playlist(parent),
    })?;

    let mut playlists = Vec::with_capacity(ordered.len());
    for row in ordered {
        let id = row.key();
        *placed += 1;

        let mut songs = entries
            .get(&id)
            .map(|list| order_entries(list))
            .unwrap_or_default();
        let sub_playlists = place_children(id, children, entries, placed)?;
        for sub in &sub_playlists {
            songs.extend_from_slice(&sub.songs);
        }

        debug!("Playlist {} has {} songs", id, songs.len());
        playlists.push(Playlist {
            id,
            name: row.title.clone().unwrap_or_default(),
            songs,
            sub_playlists,
        });
    }

    Ok(playlists)
}

/// Write a forest back out as linked rows, the inverse of [`build_tree`].
///
/// Only each playlist's own songs become entries; entry IDs are assigned
/// sequentially from 1.
pub fn flatten(playlists: &[Playlist]) -> (Vec<PlaylistRow>, Vec<PlaylistEntityRow>) {
    let mut rows = Vec::new();
    let mut entries = Vec::new();
    flatten_into(playlists, 0, &mut rows, &mut entries);
    (rows, entries)
}

fn flatten_into(
    siblings: &[Playlist],
    parent: i64,
    rows: &mut Vec<PlaylistRow>,
    entries: &mut Vec<PlaylistEntityRow>,
) {
    for (i, playlist) in siblings.iter().enumerate() {
        rows.push(PlaylistRow {
            id: Some(playlist.id),
            title: Some(playlist.name.clone()),
            parent_list_id: Some(parent),
            next_list_id: Some(siblings.get(i + 1).map_or(0, |next| next.id)),
        });

        let own = playlist.own_songs();
        let first_id = entries.len() as i64 + 1;
        for (j, &track_id) in own.iter().enumerate() {
            let id = first_id + j as i64;
            let next = if j + 1 < own.len() { id + 1 } else { 0 };
            entries.push(PlaylistEntityRow {
                id: Some(id),
                list_id: Some(playlist.id),
                track_id: Some(track_id),
                next_entity_id: Some(next),
            });
        }

        flatten_into(&playlist.sub_playlists, playlist.id, rows, entries);
    }
}

/// Smartlists grouped by parent path, each group in linked order.
pub fn order_smartlists(rows: &[SmartlistRow]) -> Result<Vec<&SmartlistRow>> {
    let mut groups: Vec<(Option<&str>, Vec<SmartlistRow>)> = Vec::new();
    for row in rows {
        let parent = row.parent_playlist_path.as_deref();
        match groups.iter_mut().find(|(path, _)| *path == parent) {
            Some((_, group)) => group.push(row.clone()),
            None => groups.push((parent, vec![row.clone()])),
        }
    }

    let mut ordered = Vec::with_capacity(rows.len());
    for (_, group) in &groups {
        for row in linearize(group)? {
            let original = rows
                .iter()
                .find(|r| r.list_uuid == row.list_uuid)
                .ok_or_else(|| Error::NotFound(format!("smartlist {:?}", row.list_uuid)))?;
            ordered.push(original);
        }
    }
    Ok(ordered)
}
