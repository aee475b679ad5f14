use super::{
    mark_type, node_type, Collection, DjPlaylists, Node, NodeTrack, Playlists, PositionMark, Product, Tempo,
    Track, DOCUMENT_VERSION, ExportOptions, MAIN_CUE_NUM, PRODUCT_COMPANY, PRODUCT_NAME,
};
use crate::convert::{camelot_from_key, date_from_unix, hex_to_rgb, path_to_uri, rating_export};
use crate::error::Result;
use crate::library::{Library, Playlist, Song};

/// Build the document for `library`, unsorted.
pub(super) fn to_document(library: &Library, options: &ExportOptions) -> Result<DjPlaylists> {
    let tracks = library
        .songs
        .iter()
        .map(|song| to_track(song, options).map_err(|e| e.for_song(song.id)))
        .collect::<Result<Vec<_>>>()?;

    let nodes: Vec<Node> = library.playlists.iter().flat_map(to_nodes).collect();

    Ok(DjPlaylists {
        version: DOCUMENT_VERSION.to_string(),
        product: Product {
            name: PRODUCT_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            company: PRODUCT_COMPANY.to_string(),
        },
        collection: Collection {
            entries: tracks.len(),
            tracks,
        },
        playlists: Playlists {
            root: Node {
                node_type: node_type::FOLDER,
                name: "ROOT".to_string(),
                count: Some(nodes.len()),
                nodes,
                ..Default::default()
            },
        },
    })
}

fn to_track(song: &Song, options: &ExportOptions) -> Result<Track> {
    let use_utc = options.use_utc;

    Ok(Track {
        track_id: song.id,
        name: song.title.clone(),
        artist: song.artist.clone(),
        composer: song.composer.clone(),
        album: song.album.clone(),
        grouping: song.grouping.clone(),
        genre: song.genre.clone(),
        kind: song.filetype.clone(),
        size: song.size,
        total_time: song.length,
        track_number: song.track_number,
        year: song.year,
        average_bpm: song.bpm,
        date_modified: date_from_unix(song.date_modified, use_utc)?,
        date_added: date_from_unix(song.date_added, use_utc)?,
        bit_rate: song.bitrate,
        sample_rate: song.sample_rate,
        comments: song.comment.clone(),
        play_count: song.play_count,
        last_played: date_from_unix(song.last_played, use_utc)?,
        rating: rating_export(song.rating.into())?.into(),
        location: if song.path.is_empty() {
            String::new()
        } else {
            path_to_uri(&song.path)
        },
        remixer: song.remixer.clone(),
        tonality: camelot_from_key(song.key.into())?,
        label: song.label.clone(),
        mix: song.mix.clone(),
        colour: to_colour(&song.color)?,
        tempo: song
            .grid
            .iter()
            .map(|marker| Tempo {
                inizio: marker.start_position,
                bpm: marker.bpm,
                metro: "4/4".to_string(),
                battito: i32::from(marker.beat_number) + 1,
            })
            .collect(),
        position_marks: to_position_marks(song)?,
    })
}

/// `#RRGGBB` to `0xRRGGBB`
fn to_colour(color: &str) -> Result<String> {
    if color.is_empty() {
        return Ok(String::new());
    }
    let (red, green, blue) = hex_to_rgb(color)?;
    Ok(format!("0x{:02X}{:02X}{:02X}", red, green, blue))
}

fn rgb(color: &str) -> Result<(Option<u8>, Option<u8>, Option<u8>)> {
    if color.is_empty() {
        return Ok((None, None, None));
    }
    let (red, green, blue) = hex_to_rgb(color)?;
    Ok((Some(red), Some(green), Some(blue)))
}

fn to_position_marks(song: &Song) -> Result<Vec<PositionMark>> {
    let mut marks = Vec::with_capacity(1 + song.cues.len() + song.loops.len());
    marks.push(PositionMark {
        mark_type: mark_type::CUE,
        start: song.cue,
        num: MAIN_CUE_NUM,
        ..Default::default()
    });

    for cue in &song.cues {
        let (red, green, blue) = rgb(&cue.color)?;
        marks.push(PositionMark {
            name: cue.name.clone(),
            mark_type: mark_type::CUE,
            start: cue.offset,
            end: None,
            num: i32::from(cue.position) - 1,
            red,
            green,
            blue,
        });
    }

    for song_loop in &song.loops {
        let (red, green, blue) = rgb(&song_loop.color)?;
        marks.push(PositionMark {
            name: song_loop.name.clone(),
            mark_type: mark_type::LOOP,
            start: song_loop.start,
            end: Some(song_loop.end),
            num: i32::from(song_loop.position) - 1,
            red,
            green,
            blue,
        });
    }

    Ok(marks)
}

/// A playlist's own songs go into a playlist node. Children go into a
/// folder node of the same name, so a playlist with both becomes two
/// sibling nodes.
fn to_nodes(playlist: &Playlist) -> Vec<Node> {
    let mut nodes = Vec::with_capacity(2);
    let own = playlist.own_songs();

    if !own.is_empty() || playlist.sub_playlists.is_empty() {
        nodes.push(Node {
            node_type: node_type::PLAYLIST,
            name: playlist.name.clone(),
            entries: Some(own.len()),
            key_type: 0,
            tracks: own.iter().map(|&key| NodeTrack { key }).collect(),
            ..Default::default()
        });
    }

    if !playlist.sub_playlists.is_empty() {
        let children: Vec<Node> = playlist.sub_playlists.iter().flat_map(to_nodes).collect();
        nodes.push(Node {
            node_type: node_type::FOLDER,
            name: playlist.name.clone(),
            count: Some(children.len()),
            nodes: children,
            ..Default::default()
        });
    }

    nodes
}
